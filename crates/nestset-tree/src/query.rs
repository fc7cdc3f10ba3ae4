//! Read-only queries translated into range predicates.
//!
//! Every query works from the coordinates of the node passed in; callers
//! holding a stale copy should refresh it first.

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{Coords, PartitionId, TreeNode};
use nestset_store::{Column, CmpOp, Coordinate, Direction, NodeStore, OrderBy, Predicate};

/// Rows enclosing `coords`, optionally including the node itself.
pub fn ancestors_predicate(coords: &Coords, include_self: bool) -> Predicate {
    let (left_op, right_op) = if include_self {
        (CmpOp::Le, CmpOp::Ge)
    } else {
        (CmpOp::Lt, CmpOp::Gt)
    };
    Predicate::Partition(coords.partition)
        .and(Predicate::cmp(Coordinate::Left, left_op, coords.left))
        .and(Predicate::cmp(Coordinate::Right, right_op, coords.right))
}

/// Rows enclosed by `coords`, optionally including the node itself.
pub fn descendants_predicate(coords: &Coords, include_self: bool) -> Predicate {
    let (left_op, right_op) = if include_self {
        (CmpOp::Ge, CmpOp::Le)
    } else {
        (CmpOp::Gt, CmpOp::Lt)
    };
    Predicate::Partition(coords.partition)
        .and(Predicate::cmp(Coordinate::Left, left_op, coords.left))
        .and(Predicate::cmp(Coordinate::Right, right_op, coords.right))
}

/// Ancestors and descendants of `coords`, the node itself included.
pub fn family_predicate(coords: &Coords) -> Predicate {
    let ancestors = Predicate::cmp(Coordinate::Left, CmpOp::Le, coords.left)
        .and(Predicate::cmp(Coordinate::Right, CmpOp::Ge, coords.right));
    let descendants = Predicate::cmp(Coordinate::Left, CmpOp::Gt, coords.left)
        .and(Predicate::cmp(Coordinate::Right, CmpOp::Lt, coords.right));
    Predicate::Partition(coords.partition).and(ancestors.or(descendants))
}

fn by_left() -> OrderBy {
    OrderBy::asc(Column::Left)
}

/// Ancestors ordered by `left`: [`Direction::Asc`] starts at the root,
/// [`Direction::Desc`] at the nearest ancestor.
pub fn get_ancestors<S: NodeStore>(
    store: &S,
    node: &S::Node,
    include_self: bool,
    direction: Direction,
) -> NestResult<Vec<S::Node>> {
    let order = match direction {
        Direction::Asc => OrderBy::asc(Column::Left),
        Direction::Desc => OrderBy::desc(Column::Left),
    };
    store.scan_ordered(&ancestors_predicate(&node.coords(), include_self), &order, None)
}

/// Descendants in preorder.
pub fn get_descendants<S: NodeStore>(
    store: &S,
    node: &S::Node,
    include_self: bool,
) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(&descendants_predicate(&node.coords(), include_self), &by_left(), None)
}

/// Ancestors, the node, and its descendants in preorder.
pub fn get_family<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(&family_predicate(&node.coords()), &by_left(), None)
}

/// Direct children in sibling order.
pub fn get_children<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(
        &Predicate::Partition(node.partition()).and(Predicate::Parent(Some(node.id()))),
        &by_left(),
        None,
    )
}

/// Descendants without children.
pub fn get_leaf_nodes<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(
        &descendants_predicate(&node.coords(), false).and(Predicate::Leaf),
        &by_left(),
        None,
    )
}

/// Nodes sharing the node's parent. For a root these are the other roots.
pub fn get_siblings<S: NodeStore>(
    store: &S,
    node: &S::Node,
    include_self: bool,
) -> NestResult<Vec<S::Node>> {
    let mut predicate = Predicate::Parent(node.parent_id());
    if !include_self {
        predicate = predicate.and(Predicate::NotId(node.id()));
    }
    store.scan_ordered(
        &predicate,
        &OrderBy::asc(Column::Partition).then_asc(Column::Left),
        None,
    )
}

/// The sibling with the smallest `left` after the node's `right`, or the
/// root of the next partition for a root.
pub fn get_next_sibling<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<Option<S::Node>> {
    if node.is_root() {
        return store.first(
            &Predicate::roots().and(Predicate::PartitionAbove(node.partition())),
            &OrderBy::asc(Column::Partition),
        );
    }
    store.first(
        &Predicate::Partition(node.partition())
            .and(Predicate::Parent(node.parent_id()))
            .and(Predicate::left_above(node.right())),
        &OrderBy::asc(Column::Left),
    )
}

/// The sibling with the largest `right` before the node's `left`, or the
/// root of the previous partition for a root.
pub fn get_previous_sibling<S: NodeStore>(
    store: &S,
    node: &S::Node,
) -> NestResult<Option<S::Node>> {
    if node.is_root() {
        return store.first(
            &Predicate::roots().and(Predicate::PartitionBelow(node.partition())),
            &OrderBy::desc(Column::Partition),
        );
    }
    store.first(
        &Predicate::Partition(node.partition())
            .and(Predicate::Parent(node.parent_id()))
            .and(Predicate::cmp(Coordinate::Right, CmpOp::Lt, node.left())),
        &OrderBy::desc(Column::Right),
    )
}

/// Every root, ordered by partition.
pub fn root_nodes<S: NodeStore>(store: &S) -> NestResult<Vec<S::Node>> {
    store.scan_ordered(&Predicate::roots(), &OrderBy::asc(Column::Partition), None)
}

/// The root of `partition`, if there is one.
pub fn root_node<S: NodeStore>(store: &S, partition: PartitionId) -> NestResult<Option<S::Node>> {
    store.first(
        &Predicate::Partition(partition).and(Predicate::roots()),
        &OrderBy::asc(Column::Id),
    )
}

/// The root of the tree holding `node`.
pub fn get_root<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<S::Node> {
    root_node(store, node.partition())?.ok_or_else(|| {
        NestError::corruption(format!("partition {} has no root", node.partition()))
    })
}

/// Re-reads `node` by id.
pub fn refresh_node<S: NodeStore>(store: &S, node: &S::Node) -> NestResult<S::Node> {
    store.get(node.id())
}
