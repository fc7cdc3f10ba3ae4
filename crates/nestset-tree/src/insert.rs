//! Insertion engine.

use tracing::{debug, info};

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{Coords, NodeId, Position, TreeNode};
use nestset_store::NodeStore;

use crate::space::{create_tree_space, shift};

/// Result of an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted<N> {
    /// The stored node, with its assigned id and coordinates.
    pub node: N,
    /// The node it was placed against, with the boundary changes the
    /// insertion caused. `None` when a new root was created on its own.
    pub target: Option<N>,
}

/// Stores `node` as a new root, or as the last child of its `parent_id`.
pub fn create_node<S: NodeStore>(store: &S, mut node: S::Node) -> NestResult<Inserted<S::Node>> {
    let Some(parent_id) = node.parent_id() else {
        let partition = store.next_partition_id()?;
        node.set_coords(Coords::root(partition));
        let id = store.insert(node.clone())?;
        node.set_id(id);
        info!(node = %id, %partition, "created tree");
        return Ok(Inserted { node, target: None });
    };

    let parent = store.get(parent_id)?;
    insert_node(store, node, &parent, Position::LastChild)
}

/// Rejects a node whose explicit id is already taken, before any gap is
/// opened for it.
fn ensure_unstored<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<()> {
    let id = node.id();
    if id.is_valid() && store.find_by_id(id)?.is_some() {
        return Err(NestError::invalid_argument(format!(
            "node {} already exists",
            id
        )));
    }
    Ok(())
}

/// Stores `node` at `position` relative to `target`.
///
/// Sibling positions against a root create a new tree next to the target's
/// partition; every other case opens a two-slot gap inside the target's
/// partition. The node's own `parent_id` is overwritten.
pub fn insert_node<S: NodeStore>(
    store: &S,
    mut node: S::Node,
    target: &S::Node,
    position: Position,
) -> NestResult<Inserted<S::Node>> {
    ensure_unstored(store, &node)?;

    let tc = target.coords();
    let mut target = target.clone();

    if target.is_root() && position.is_sibling() {
        let partition = if position == Position::Left {
            create_tree_space(store, tc.partition.prev(), 1)?;
            target.set_partition(tc.partition.next());
            tc.partition
        } else {
            create_tree_space(store, tc.partition, 1)?;
            tc.partition.next()
        };
        node.set_parent_id(None);
        node.set_coords(Coords::root(partition));
        let id = store.insert(node.clone())?;
        node.set_id(id);
        info!(node = %id, target = %target.id(), %partition, %position, "inserted tree beside root");
        return Ok(Inserted {
            node,
            target: Some(target),
        });
    }

    let (edge, level, parent): (i64, i64, Option<NodeId>) = match position {
        Position::LastChild => (tc.right, tc.level + 1, Some(target.id())),
        Position::FirstChild => (tc.left + 1, tc.level + 1, Some(target.id())),
        Position::Left => (tc.left, tc.level, target.parent_id()),
        Position::Right => (tc.right + 1, tc.level, target.parent_id()),
    };

    shift(store, tc.partition, edge - 1, 2)?;

    node.set_parent_id(parent);
    node.set_coords(Coords {
        partition: tc.partition,
        level,
        left: edge,
        right: edge + 1,
    });
    let id = store.insert(node.clone())?;
    node.set_id(id);

    // Mirror the shift on the caller's copy of the target.
    match position {
        Position::LastChild | Position::FirstChild => target.set_bounds(tc.left, tc.right + 2),
        Position::Left => target.set_bounds(tc.left + 2, tc.right + 2),
        Position::Right => {}
    }

    debug!(node = %id, target = %target.id(), partition = %tc.partition, %position, edge, "inserted node");
    Ok(Inserted {
        node,
        target: Some(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestset_common::types::{NodeBase, PartitionId};
    use nestset_store::MemoryStore;

    #[test]
    fn test_create_roots_allocate_partitions() {
        let store = MemoryStore::<NodeBase>::new();
        for i in 1..=3 {
            let created = create_node(&store, NodeBase::new_root()).unwrap();
            assert_eq!(created.node.partition, PartitionId::new(i));
            assert_eq!((created.node.level, created.node.left, created.node.right), (1, 1, 2));
            assert!(created.target.is_none());
        }
    }

    #[test]
    fn test_create_child_appends_last() {
        let store = MemoryStore::<NodeBase>::new();
        let root = create_node(&store, NodeBase::new_root()).unwrap().node;
        let a = create_node(&store, NodeBase::child_of(root.id)).unwrap();
        assert_eq!((a.node.left, a.node.right, a.node.level), (2, 3, 2));
        assert_eq!(a.target.as_ref().map(|t| t.right), Some(4));

        let b = create_node(&store, NodeBase::child_of(root.id)).unwrap();
        assert_eq!((b.node.left, b.node.right), (4, 5));
        assert_eq!(store.get(root.id).unwrap().right, 6);
    }

    #[test]
    fn test_insert_edges() {
        let store = MemoryStore::<NodeBase>::new();
        let root = create_node(&store, NodeBase::new_root()).unwrap().node;
        let a = create_node(&store, NodeBase::child_of(root.id)).unwrap().node;

        let first = insert_node(&store, NodeBase::new_root(), &a, Position::FirstChild).unwrap();
        assert_eq!((first.node.left, first.node.right, first.node.level), (3, 4, 3));
        assert_eq!(first.node.parent_id, Some(a.id));
        assert_eq!(first.target.map(|t| (t.left, t.right)), Some((2, 5)));

        let a = store.get(a.id).unwrap();
        let left = insert_node(&store, NodeBase::new_root(), &a, Position::Left).unwrap();
        assert_eq!((left.node.left, left.node.right, left.node.level), (2, 3, 2));
        assert_eq!(left.node.parent_id, Some(root.id));
        assert_eq!(left.target.as_ref().map(|t| (t.left, t.right)), Some((4, 7)));
        assert_eq!(store.get(a.id).unwrap().left, 4);

        let a = store.get(a.id).unwrap();
        let right = insert_node(&store, NodeBase::new_root(), &a, Position::Right).unwrap();
        assert_eq!((right.node.left, right.node.right), (8, 9));
        assert_eq!(right.target.map(|t| (t.left, t.right)), Some((4, 7)));
        assert_eq!(store.get(root.id).unwrap().right, 10);
    }

    #[test]
    fn test_insert_beside_root() {
        let store = MemoryStore::<NodeBase>::new();
        let first = create_node(&store, NodeBase::new_root()).unwrap().node;
        let second = create_node(&store, NodeBase::new_root()).unwrap().node;

        let left = insert_node(&store, NodeBase::new_root(), &second, Position::Left).unwrap();
        assert_eq!(left.node.partition, PartitionId::new(2));
        assert_eq!(left.target.map(|t| t.partition), Some(PartitionId::new(3)));
        assert_eq!(store.get(second.id).unwrap().partition, PartitionId::new(3));

        let first = store.get(first.id).unwrap();
        let right = insert_node(&store, NodeBase::new_root(), &first, Position::Right).unwrap();
        assert_eq!(right.node.partition, PartitionId::new(2));
        assert!(right.node.is_root());
        assert_eq!(store.get(left.node.id).unwrap().partition, PartitionId::new(3));
        assert_eq!(store.get(second.id).unwrap().partition, PartitionId::new(4));
    }

    #[test]
    fn test_insert_existing_id_writes_nothing() {
        let store = MemoryStore::<NodeBase>::new();
        let first = create_node(&store, NodeBase::new_root()).unwrap().node;
        let root = create_node(&store, NodeBase::new_root()).unwrap().node;
        let a = create_node(&store, NodeBase::child_of(root.id)).unwrap().node;
        let root = store.get(root.id).unwrap();
        let before = store.all();

        for position in [Position::LastChild, Position::FirstChild, Position::Left] {
            let err = insert_node(&store, a.clone(), &root, position).unwrap_err();
            assert_eq!(err.code(), nestset_common::ErrorCode::InvalidArgument);
            assert_eq!(store.all(), before);
        }
        let err = insert_node(&store, a.clone(), &first, Position::Right).unwrap_err();
        assert_eq!(err.code(), nestset_common::ErrorCode::InvalidArgument);
        assert_eq!(store.all(), before);

        let err = create_node(&store, a.clone()).unwrap_err();
        assert_eq!(err.code(), nestset_common::ErrorCode::InvalidArgument);
        assert_eq!(store.all(), before);
    }

    #[test]
    fn test_missing_parent() {
        let store = MemoryStore::<NodeBase>::new();
        let err = create_node(&store, NodeBase::child_of(NodeId::new(42))).unwrap_err();
        assert_eq!(err.code(), nestset_common::ErrorCode::NodeNotFound);
        assert!(store.is_empty());
    }
}
