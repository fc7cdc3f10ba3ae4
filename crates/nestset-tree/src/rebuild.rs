//! Rebuild engine.
//!
//! Recomputes every coordinate from `parent_id` links alone. Children are
//! visited in order of their current `left`, so a rebuild of an already
//! consistent forest reproduces it exactly.

use tracing::{debug, info, warn};

use nestset_common::error::NestResult;
use nestset_common::types::{Coords, NodeId, PartitionId, TreeNode};
use nestset_store::{Column, FieldSet, NodeStore, OrderBy, PartitionAction, Predicate, Transform};

/// Rows rewritten by a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Trees traversed.
    pub trees: usize,
    /// Nodes whose coordinates were written.
    pub nodes: usize,
    /// Partitions renumbered during compaction.
    pub renumbered: usize,
}

impl RebuildStats {
    fn absorb(&mut self, other: RebuildStats) {
        self.trees += other.trees;
        self.nodes += other.nodes;
        self.renumbered += other.renumbered;
    }
}

/// Recomputes the trees whose root claims `partition`.
///
/// When several roots share the partition the one with the lowest id keeps
/// it and every other one moves to a fresh partition.
pub fn partial_rebuild<S: NodeStore>(store: &S, partition: PartitionId) -> NestResult<RebuildStats> {
    let roots = store.scan_ordered(
        &Predicate::Partition(partition).and(Predicate::roots()),
        &OrderBy::asc(Column::Id),
        None,
    )?;
    if roots.len() > 1 {
        warn!(%partition, roots = roots.len(), "several roots share one partition");
    }

    let mut stats = RebuildStats::default();
    for (i, root) in roots.into_iter().enumerate() {
        let assigned = if i == 0 {
            partition
        } else {
            store.next_partition_id()?
        };
        stats.nodes += rebuild_tree(store, root, assigned)?;
        stats.trees += 1;
    }
    debug!(%partition, trees = stats.trees, nodes = stats.nodes, "partial rebuild");
    Ok(stats)
}

/// Recomputes every tree, then compacts partitions to `1..=N` in their
/// current order.
///
/// Rows that cannot be reached from any root keep their old coordinates;
/// their partition is only renumbered if it matches a root's.
pub fn rebuild<S: NodeStore>(store: &S) -> NestResult<RebuildStats> {
    let roots = store.scan_ordered(&Predicate::roots(), &OrderBy::asc(Column::Partition), None)?;
    let mut partitions: Vec<PartitionId> = roots.iter().map(|root| root.partition()).collect();
    partitions.dedup();

    let mut stats = RebuildStats::default();
    for partition in partitions {
        stats.absorb(partial_rebuild(store, partition)?);
    }

    // One statement for the whole renumbering: arms see pre-update
    // partitions, so old and new ids may overlap.
    let roots = store.scan_ordered(&Predicate::roots(), &OrderBy::asc(Column::Partition), None)?;
    let mut renumber = Transform::new();
    let mut expected = PartitionId::FIRST;
    for root in &roots {
        let current = root.partition();
        if current != expected {
            renumber = renumber.partition(Predicate::Partition(current), PartitionAction::Set(expected));
            stats.renumbered += 1;
        }
        expected = expected.next();
    }
    if !renumber.is_empty() {
        store.bulk_transform(&Predicate::All, &renumber)?;
    }

    info!(trees = stats.trees, nodes = stats.nodes, renumbered = stats.renumbered, "rebuilt forest");
    Ok(stats)
}

struct Frame<N> {
    node: N,
    level: i64,
    left: i64,
    children: std::vec::IntoIter<N>,
}

/// Depth-first walk with an explicit stack; writes each node on exit.
fn rebuild_tree<S: NodeStore>(store: &S, root: S::Node, partition: PartitionId) -> NestResult<usize> {
    let mut counter = 1;
    let mut written = 0;
    let children = children_of(store, root.id())?;
    let mut stack = vec![Frame {
        node: root,
        level: 1,
        left: counter,
        children: children.into_iter(),
    }];
    counter += 1;

    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.children.next() {
            let level = frame.level + 1;
            let children = children_of(store, child.id())?;
            stack.push(Frame {
                node: child,
                level,
                left: counter,
                children: children.into_iter(),
            });
            counter += 1;
            continue;
        }

        let Some(Frame {
            mut node, level, left, ..
        }) = stack.pop()
        else {
            break;
        };
        node.set_coords(Coords {
            partition,
            level,
            left,
            right: counter,
        });
        counter += 1;
        store.update_fields(node.base(), FieldSet::COORDS)?;
        written += 1;
    }

    Ok(written)
}

fn children_of<S: NodeStore>(store: &S, id: NodeId) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(
        &Predicate::Parent(Some(id)),
        &OrderBy::asc(Column::Left),
        None,
    )
}
