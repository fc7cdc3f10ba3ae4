//! Move engine.
//!
//! A move is classified by the shape of the node and the target:
//!
//! | node     | target              | handler                   |
//! |----------|---------------------|---------------------------|
//! | non-root | none                | [`make_child_root_node`]  |
//! | any      | root, left/right    | sibling of root           |
//! | root     | any other           | root absorbed into a tree |
//! | non-root | same partition      | in-place shift            |
//! | non-root | other partition     | relocate across trees     |
//!
//! Validation happens before the first write. Each handler issues at most
//! two bulk statements followed by one write of the moved row.

use tracing::{debug, info};

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{Coords, NodeId, PartitionId, Position, TreeNode};
use nestset_store::{Column, FieldSet, NodeStore, OrderBy, PartitionAction, Predicate, Transform};

use crate::space::{create_tree_space, shift};

/// Result of a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved<N> {
    /// The moved node as stored afterwards.
    pub node: N,
    /// The target as stored afterwards.
    pub target: Option<N>,
    /// False when the move was a no-op.
    pub changed: bool,
}

/// Rejects self-targeting and moves into the node's own subtree.
pub fn validate_move<N: TreeNode>(node: &N, target: &N) -> NestResult<()> {
    if node.id() == target.id() {
        return Err(NestError::SelfReference { node: node.id() });
    }
    if node.partition() == target.partition() && node.coords().strictly_contains(target.left()) {
        return Err(NestError::Cycle {
            node: node.id(),
            target: target.id(),
        });
    }
    Ok(())
}

/// Moves `node` to `position` relative to `target`, or detaches it into a
/// new tree when `target` is `None`.
pub fn move_node<S: NodeStore>(
    store: &S,
    node: &S::Node,
    target: Option<&S::Node>,
    position: Position,
) -> NestResult<Moved<S::Node>> {
    let Some(target) = target else {
        if node.is_root() {
            return Ok(Moved {
                node: node.clone(),
                target: None,
                changed: false,
            });
        }
        let node = make_child_root_node(store, node, None)?;
        return Ok(Moved {
            node,
            target: None,
            changed: true,
        });
    };

    validate_move(node, target)?;

    let changed = if target.is_root() && position.is_sibling() {
        make_sibling_of_root(store, node, target, position)?
    } else if node.is_root() {
        move_root_node(store, node, target, position)?;
        true
    } else if node.partition() == target.partition() {
        move_within_tree(store, node, target, position)?
    } else {
        move_across_trees(store, node, target, position)?;
        true
    };

    Ok(Moved {
        node: store.get(node.id())?,
        target: Some(store.get(target.id())?),
        changed,
    })
}

/// Detaches `node`'s subtree into its own tree.
///
/// The subtree is renormalized to start at 1 in `new_partition` (or the
/// next free partition) and the gap it leaves is closed, all in one bulk
/// statement.
pub fn make_child_root_node<S: NodeStore>(
    store: &S,
    node: &S::Node,
    new_partition: Option<PartitionId>,
) -> NestResult<S::Node> {
    let c = node.coords();
    let width = c.width();
    let offset = c.left - 1;
    let partition = match new_partition {
        Some(p) => p,
        None => store.next_partition_id()?,
    };

    let inside = Predicate::left_between(c.left, c.right);
    let transform = Transform::new()
        .level(inside.clone(), -(c.level - 1))
        .partition(inside.clone(), PartitionAction::Set(partition))
        .left(inside, -offset)
        .left(Predicate::left_above(c.right), -width)
        .right(Predicate::right_between(c.left, c.right), -offset)
        .right(Predicate::right_above(c.right), -width);
    let rows = store.bulk_transform(&Predicate::Partition(c.partition), &transform)?;

    let mut moved = node.clone();
    moved.set_parent_id(None);
    moved.set_coords(Coords {
        partition,
        level: 1,
        left: 1,
        right: c.right - offset,
    });
    store.update_fields(moved.base(), FieldSet::ALL)?;

    info!(node = %node.id(), from = %c.partition, to = %partition, rows, "detached subtree into new tree");
    Ok(moved)
}

/// Places `node` as a root-level sibling of the root `target`.
///
/// Returns false when the node already sits in the requested spot.
fn make_sibling_of_root<S: NodeStore>(
    store: &S,
    node: &S::Node,
    target: &S::Node,
    position: Position,
) -> NestResult<bool> {
    let tp = target.partition();

    if node.is_child() {
        let (space, new_partition) = if position == Position::Left {
            (tp.prev(), tp)
        } else {
            (tp, tp.next())
        };
        create_tree_space(store, space, 1)?;
        let mut node = node.clone();
        if node.partition() > space {
            node.set_partition(node.partition().next());
        }
        make_child_root_node(store, &node, Some(new_partition))?;
        return Ok(true);
    }

    let np = node.partition();
    let (new_partition, low, high, delta) = match position {
        Position::Left if tp > np => {
            let Some(sibling) = neighbour_root(store, tp, false)? else {
                return Ok(false);
            };
            if sibling.id() == node.id() {
                return Ok(false);
            }
            let p = sibling.partition();
            (p, np, p, -1)
        }
        Position::Left => (tp, tp, np, 1),
        Position::Right if tp > np => (tp, np, tp, -1),
        _ => {
            let Some(sibling) = neighbour_root(store, tp, true)? else {
                return Ok(false);
            };
            if sibling.id() == node.id() {
                return Ok(false);
            }
            let p = sibling.partition();
            (p, p, np, 1)
        }
    };

    let transform = Transform::new()
        .partition(Predicate::Partition(np), PartitionAction::Set(new_partition))
        .partition(Predicate::All, PartitionAction::Shift(delta));
    let rows = store.bulk_transform(&Predicate::PartitionBetween(low, high), &transform)?;
    info!(node = %node.id(), target = %target.id(), from = %np, to = %new_partition, rows, "repositioned tree");
    Ok(true)
}

/// The root of the nearest partition above (or below) `partition`.
fn neighbour_root<S: NodeStore>(
    store: &S,
    partition: PartitionId,
    above: bool,
) -> NestResult<Option<S::Node>> {
    if above {
        store.first(
            &Predicate::roots().and(Predicate::PartitionAbove(partition)),
            &OrderBy::asc(Column::Partition),
        )
    } else {
        store.first(
            &Predicate::roots().and(Predicate::PartitionBelow(partition)),
            &OrderBy::desc(Column::Partition),
        )
    }
}

/// Where a subtree lands when it moves into another partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Landing {
    space_target: i64,
    level_offset: i64,
    parent: Option<NodeId>,
}

fn inter_tree_landing<N: TreeNode>(node: &N, target: &N, position: Position) -> Landing {
    let t = target.coords();
    let level = node.level();
    match position {
        Position::LastChild => Landing {
            space_target: t.right - 1,
            level_offset: level - t.level - 1,
            parent: Some(target.id()),
        },
        Position::FirstChild => Landing {
            space_target: t.left,
            level_offset: level - t.level - 1,
            parent: Some(target.id()),
        },
        Position::Left => Landing {
            space_target: t.left - 1,
            level_offset: level - t.level,
            parent: target.parent_id(),
        },
        Position::Right => Landing {
            space_target: t.right,
            level_offset: level - t.level,
            parent: target.parent_id(),
        },
    }
}

/// Merges the whole tree rooted at `node` into `target`'s tree.
///
/// The source partition is left empty; ids are not compacted.
fn move_root_node<S: NodeStore>(
    store: &S,
    node: &S::Node,
    target: &S::Node,
    position: Position,
) -> NestResult<()> {
    let c = node.coords();
    let tp = target.partition();
    let landing = inter_tree_landing(node, target, position);
    let offset = c.left - landing.space_target - 1;

    shift(store, tp, landing.space_target, c.width())?;

    let transform = Transform::new()
        .level(Predicate::All, -landing.level_offset)
        .partition(Predicate::All, PartitionAction::Set(tp))
        .bounds(Predicate::All, -offset);
    let scope = Predicate::Partition(c.partition).and(Predicate::left_between(c.left, c.right));
    let rows = store.bulk_transform(&scope, &transform)?;

    write_moved(store, node, tp, landing.parent, c.level - landing.level_offset, c.left - offset, c.right - offset)?;
    info!(node = %node.id(), target = %target.id(), from = %c.partition, to = %tp, %position, rows, "merged tree into target");
    Ok(())
}

/// Moves a non-root subtree to another partition.
fn move_across_trees<S: NodeStore>(
    store: &S,
    node: &S::Node,
    target: &S::Node,
    position: Position,
) -> NestResult<()> {
    let c = node.coords();
    let width = c.width();
    let tp = target.partition();
    let landing = inter_tree_landing(node, target, position);
    let offset = c.left - landing.space_target - 1;

    shift(store, tp, landing.space_target, width)?;

    let inside = Predicate::left_between(c.left, c.right);
    let transform = Transform::new()
        .level(inside.clone(), -landing.level_offset)
        .partition(inside, PartitionAction::Set(tp))
        .left(Predicate::left_between(c.left, c.right), -offset)
        .left(Predicate::left_above(c.right), -width)
        .right(Predicate::right_between(c.left, c.right), -offset)
        .right(Predicate::right_above(c.right), -width);
    let rows = store.bulk_transform(&Predicate::Partition(c.partition), &transform)?;

    write_moved(store, node, tp, landing.parent, c.level - landing.level_offset, c.left - offset, c.right - offset)?;
    info!(node = %node.id(), target = %target.id(), from = %c.partition, to = %tp, %position, rows, "moved subtree across trees");
    Ok(())
}

/// Moves a non-root subtree inside its own partition in one statement.
///
/// Returns false when the subtree already sits at the requested spot.
fn move_within_tree<S: NodeStore>(
    store: &S,
    node: &S::Node,
    target: &S::Node,
    position: Position,
) -> NestResult<bool> {
    let c = node.coords();
    let t = target.coords();
    let width = c.width();

    let (new_left, new_right) = match position {
        Position::LastChild if t.right > c.right => (t.right - width, t.right - 1),
        Position::LastChild => (t.right, t.right + width - 1),
        Position::FirstChild if t.left > c.left => (t.left - width + 1, t.left),
        Position::FirstChild => (t.left + 1, t.left + width),
        Position::Left if t.left > c.left => (t.left - width, t.left - 1),
        Position::Left => (t.left, t.left + width - 1),
        Position::Right if t.right > c.right => (t.right - width + 1, t.right),
        Position::Right => (t.right + 1, t.right + width),
    };
    let (level_offset, parent) = if position.is_child() {
        (c.level - t.level - 1, Some(target.id()))
    } else {
        (c.level - t.level, target.parent_id())
    };

    let offset = new_left - c.left;
    if offset == 0 && level_offset == 0 && parent == node.parent_id() {
        debug!(node = %node.id(), target = %target.id(), %position, "node already in place");
        return Ok(false);
    }

    let low = c.left.min(new_left);
    let high = c.right.max(new_right);
    let gap = if offset > 0 { -width } else { width };

    let transform = Transform::new()
        .level(Predicate::left_between(c.left, c.right), -level_offset)
        .left(Predicate::left_between(c.left, c.right), offset)
        .left(Predicate::left_between(low, high), gap)
        .right(Predicate::right_between(c.left, c.right), offset)
        .right(Predicate::right_between(low, high), gap);
    let rows = store.bulk_transform(&Predicate::Partition(c.partition), &transform)?;

    write_moved(store, node, c.partition, parent, c.level - level_offset, new_left, new_right)?;
    debug!(node = %node.id(), target = %target.id(), partition = %c.partition, %position, offset, rows, "moved subtree within tree");
    Ok(true)
}

fn write_moved<S: NodeStore>(
    store: &S,
    node: &S::Node,
    partition: PartitionId,
    parent: Option<NodeId>,
    level: i64,
    left: i64,
    right: i64,
) -> NestResult<()> {
    let mut moved = node.clone();
    moved.set_parent_id(parent);
    moved.set_coords(Coords {
        partition,
        level,
        left,
        right,
    });
    store.update_fields(moved.base(), FieldSet::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insert::create_node;
    use nestset_common::types::NodeBase;
    use nestset_common::ErrorCode;
    use nestset_store::MemoryStore;

    /// root(1,10) { a(2,5) { a1(3,4) }, b(6,9) { b1(7,8) } }
    fn sample() -> (MemoryStore<NodeBase>, [NodeId; 5]) {
        let store = MemoryStore::new();
        let root = create_node(&store, NodeBase::new_root()).unwrap().node.id;
        let a = create_node(&store, NodeBase::child_of(root)).unwrap().node.id;
        let a1 = create_node(&store, NodeBase::child_of(a)).unwrap().node.id;
        let b = create_node(&store, NodeBase::child_of(root)).unwrap().node.id;
        let b1 = create_node(&store, NodeBase::child_of(b)).unwrap().node.id;
        (store, [root, a, a1, b, b1])
    }

    fn coords(store: &MemoryStore<NodeBase>, id: NodeId) -> (u64, i64, i64, i64) {
        let n = store.get(id).unwrap();
        (n.partition.as_u64(), n.level, n.left, n.right)
    }

    fn mv(store: &MemoryStore<NodeBase>, node: NodeId, target: NodeId, position: Position) -> Moved<NodeBase> {
        let node = store.get(node).unwrap();
        let target = store.get(target).unwrap();
        move_node(store, &node, Some(&target), position).unwrap()
    }

    #[test]
    fn test_sample_layout() {
        let (store, [root, a, a1, b, b1]) = sample();
        assert_eq!(coords(&store, root), (1, 1, 1, 10));
        assert_eq!(coords(&store, a), (1, 2, 2, 5));
        assert_eq!(coords(&store, a1), (1, 3, 3, 4));
        assert_eq!(coords(&store, b), (1, 2, 6, 9));
        assert_eq!(coords(&store, b1), (1, 3, 7, 8));
    }

    #[test]
    fn test_within_tree_forward() {
        let (store, [root, a, a1, b, b1]) = sample();
        let moved = mv(&store, a, b, Position::LastChild);
        assert!(moved.changed);
        assert_eq!(moved.node.parent_id, Some(b));
        assert_eq!(coords(&store, root), (1, 1, 1, 10));
        assert_eq!(coords(&store, b), (1, 2, 2, 9));
        assert_eq!(coords(&store, b1), (1, 3, 3, 4));
        assert_eq!(coords(&store, a), (1, 3, 5, 8));
        assert_eq!(coords(&store, a1), (1, 4, 6, 7));
    }

    #[test]
    fn test_within_tree_backward() {
        let (store, [_, a, a1, b, b1]) = sample();
        mv(&store, b, a, Position::FirstChild);
        assert_eq!(coords(&store, a), (1, 2, 2, 9));
        assert_eq!(coords(&store, b), (1, 3, 3, 6));
        assert_eq!(coords(&store, b1), (1, 4, 4, 5));
        assert_eq!(coords(&store, a1), (1, 3, 7, 8));
    }

    #[test]
    fn test_within_tree_siblings() {
        let (store, [_, a, _, b, _]) = sample();
        mv(&store, a, b, Position::Right);
        assert_eq!(coords(&store, b), (1, 2, 2, 5));
        assert_eq!(coords(&store, a), (1, 2, 6, 9));

        mv(&store, a, b, Position::Left);
        assert_eq!(coords(&store, a), (1, 2, 2, 5));
        assert_eq!(coords(&store, b), (1, 2, 6, 9));

        let moved = mv(&store, a, b, Position::Left);
        assert!(!moved.changed);
        assert_eq!(coords(&store, a), (1, 2, 2, 5));
    }

    #[test]
    fn test_move_up_a_level() {
        let (store, [root, a, a1, b, _]) = sample();
        mv(&store, a1, b, Position::Left);
        assert_eq!(store.get(a1).unwrap().parent_id, Some(root));
        assert_eq!(coords(&store, a), (1, 2, 2, 3));
        assert_eq!(coords(&store, a1), (1, 2, 4, 5));
        assert_eq!(coords(&store, b), (1, 2, 6, 9));
    }

    #[test]
    fn test_rejects_cycle_and_self() {
        let (store, [root, a, a1, _, _]) = sample();
        let before = store.all();

        let node = store.get(a).unwrap();
        let target = store.get(a1).unwrap();
        let err = move_node(&store, &node, Some(&target), Position::LastChild).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Cycle);

        let err = move_node(&store, &node, Some(&node), Position::Left).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SelfReference);

        let root = store.get(root).unwrap();
        let err = move_node(&store, &root, Some(&target), Position::Right).unwrap_err();
        assert!(err.is_rejected_move());

        assert_eq!(store.all(), before);
    }

    #[test]
    fn test_detach_to_new_tree() {
        let (store, [root, a, a1, b, b1]) = sample();
        let node = store.get(b).unwrap();
        let moved = move_node(&store, &node, None, Position::LastChild).unwrap();
        assert!(moved.changed);
        assert!(moved.node.is_root());
        assert_eq!(coords(&store, b), (2, 1, 1, 4));
        assert_eq!(coords(&store, b1), (2, 2, 2, 3));
        assert_eq!(coords(&store, root), (1, 1, 1, 6));
        assert_eq!(coords(&store, a), (1, 2, 2, 5));
        assert_eq!(coords(&store, a1), (1, 3, 3, 4));

        // Detaching a root is a no-op.
        let node = store.get(b).unwrap();
        let moved = move_node(&store, &node, None, Position::LastChild).unwrap();
        assert!(!moved.changed);
    }

    #[test]
    fn test_across_trees_keeps_width() {
        let (store, [root, a, a1, _, _]) = sample();
        let other = create_node(&store, NodeBase::new_root()).unwrap().node.id;
        let leaf = create_node(&store, NodeBase::child_of(other)).unwrap().node.id;

        mv(&store, a, leaf, Position::LastChild);
        assert_eq!(coords(&store, root), (1, 1, 1, 6));
        assert_eq!(coords(&store, other), (2, 1, 1, 8));
        assert_eq!(coords(&store, leaf), (2, 2, 2, 7));
        assert_eq!(coords(&store, a), (2, 3, 3, 6));
        assert_eq!(coords(&store, a1), (2, 4, 4, 5));
    }

    #[test]
    fn test_root_merged_into_tree() {
        let (store, [root, a, a1, _, _]) = sample();
        let other = create_node(&store, NodeBase::new_root()).unwrap().node.id;
        let child = create_node(&store, NodeBase::child_of(other)).unwrap().node.id;

        mv(&store, other, a, Position::Right);
        assert_eq!(store.get(other).unwrap().parent_id, Some(root));
        assert_eq!(coords(&store, a), (1, 2, 2, 5));
        assert_eq!(coords(&store, a1), (1, 3, 3, 4));
        assert_eq!(coords(&store, other), (1, 2, 6, 9));
        assert_eq!(coords(&store, child), (1, 3, 7, 8));
        assert_eq!(coords(&store, root), (1, 1, 1, 14));
        assert_eq!(store.next_partition_id().unwrap(), PartitionId::new(2));
    }

    #[test]
    fn test_reorder_roots() {
        let store = MemoryStore::<NodeBase>::new();
        let roots: Vec<NodeId> = (0..4)
            .map(|_| create_node(&store, NodeBase::new_root()).unwrap().node.id)
            .collect();
        let partition_of = |id: NodeId| store.get(id).unwrap().partition.as_u64();

        // 1 2 3 4 -> 2 3 1 4
        mv(&store, roots[0], roots[3], Position::Left);
        let order: Vec<u64> = roots.iter().map(|id| partition_of(*id)).collect();
        assert_eq!(order, vec![3, 1, 2, 4]);

        // Already directly left of its target.
        let moved = mv(&store, roots[0], roots[3], Position::Left);
        assert!(!moved.changed);

        // -> 4 2 3 1, i.e. the last root moves to the front.
        mv(&store, roots[3], roots[1], Position::Left);
        let order: Vec<u64> = roots.iter().map(|id| partition_of(*id)).collect();
        assert_eq!(order, vec![4, 2, 3, 1]);

        // Right of the first root, from the back.
        mv(&store, roots[0], roots[3], Position::Right);
        let order: Vec<u64> = roots.iter().map(|id| partition_of(*id)).collect();
        assert_eq!(order, vec![2, 3, 4, 1]);

        // Right of a lower root, from the front.
        mv(&store, roots[3], roots[1], Position::Right);
        let order: Vec<u64> = roots.iter().map(|id| partition_of(*id)).collect();
        assert_eq!(order, vec![1, 2, 4, 3]);
    }

    #[test]
    fn test_child_becomes_sibling_of_root() {
        let (store, [root, a, a1, _, _]) = sample();
        let other = create_node(&store, NodeBase::new_root()).unwrap().node.id;

        mv(&store, a, other, Position::Left);
        assert_eq!(coords(&store, root), (1, 1, 1, 6));
        assert_eq!(coords(&store, a), (2, 1, 1, 4));
        assert_eq!(coords(&store, a1), (2, 2, 2, 3));
        assert_eq!(coords(&store, other), (3, 1, 1, 2));
        assert!(store.get(a).unwrap().is_root());
    }
}
