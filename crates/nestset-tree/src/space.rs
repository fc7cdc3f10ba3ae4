//! Space management: opening and closing room inside a partition and in
//! the partition-id sequence.
//!
//! Every mutation in this crate is built out of these two statements plus a
//! write of the moved node's own row.

use tracing::debug;

use nestset_common::error::NestResult;
use nestset_common::types::PartitionId;
use nestset_store::{NodeStore, PartitionAction, Predicate, Transform};

/// Adds `delta` to every boundary greater than `pivot` in `partition`.
///
/// A positive delta opens a gap of that width just after `pivot`; a negative
/// one closes a gap that ends at `pivot - delta`. Rows of other partitions
/// are never touched. Returns the number of rows rewritten.
pub fn shift<S: NodeStore>(
    store: &S,
    partition: PartitionId,
    pivot: i64,
    delta: i64,
) -> NestResult<usize> {
    let scope = Predicate::Partition(partition)
        .and(Predicate::left_above(pivot).or(Predicate::right_above(pivot)));
    let transform = Transform::new()
        .left(Predicate::left_above(pivot), delta)
        .right(Predicate::right_above(pivot), delta);
    let rows = store.bulk_transform(&scope, &transform)?;
    debug!(%partition, pivot, delta, rows, "shift");
    Ok(rows)
}

/// Renumbers every partition above `after` by `count`, leaving the ids
/// `after + 1 ..= after + count` unused.
pub fn create_tree_space<S: NodeStore>(
    store: &S,
    after: PartitionId,
    count: i64,
) -> NestResult<usize> {
    let transform = Transform::new().partition(Predicate::All, PartitionAction::Shift(count));
    let rows = store.bulk_transform(&Predicate::PartitionAbove(after), &transform)?;
    debug!(%after, count, rows, "create tree space");
    Ok(rows)
}
