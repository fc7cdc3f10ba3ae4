//! Deletion engine.

use tracing::info;

use nestset_common::error::NestResult;
use nestset_common::types::{NodeId, TreeNode};
use nestset_store::{NodeStore, PartitionAction, Predicate, Transform};

use crate::space::shift;

/// Deletes the node `id` and its whole subtree, then closes the gap.
///
/// Coordinates are re-read from the store first. Deleting a root also
/// renumbers every later partition down by one. Returns the number of rows
/// removed.
pub fn delete_node<S: NodeStore>(store: &S, id: NodeId) -> NestResult<usize> {
    let node = store.get(id)?;
    let c = node.coords();

    let subtree = Predicate::Partition(c.partition).and(Predicate::left_between(c.left, c.right - 1));
    let removed = store.delete_where(&subtree)?;
    shift(store, c.partition, c.left - 1, -c.width())?;

    if node.is_root() {
        let renumber = Transform::new().partition(Predicate::All, PartitionAction::Shift(-1));
        store.bulk_transform(&Predicate::PartitionAbove(c.partition), &renumber)?;
    }

    info!(node = %id, partition = %c.partition, rows = removed, root = node.is_root(), "deleted subtree");
    Ok(removed)
}
