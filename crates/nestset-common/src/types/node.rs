//! The node record shape and its typed accessor capability.
//!
//! Every tree element carries a parent link plus four derived coordinates:
//! partition, level, left, right. Concrete record types embed a [`NodeBase`]
//! and implement [`TreeNode`] once, which gives the engines typed get/set
//! access to those five fields.

use serde::{Deserialize, Serialize};

use super::ids::{NodeId, PartitionId};

/// The four derived coordinates of a node.
///
/// Within one partition the `(left, right)` intervals form a laminar family
/// rooted at the node with `left == 1`. `right - left` is always odd.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coords {
    /// Which independent tree the node belongs to.
    pub partition: PartitionId,
    /// Depth, root = 1.
    pub level: i64,
    /// Nested-set left boundary.
    pub left: i64,
    /// Nested-set right boundary.
    pub right: i64,
}

impl Coords {
    /// Coordinates of a fresh single-node tree in `partition`.
    #[must_use]
    pub const fn root(partition: PartitionId) -> Self {
        Self {
            partition,
            level: 1,
            left: 1,
            right: 2,
        }
    }

    /// Number of boundary slots the node's subtree occupies.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Number of descendants encoded by the interval.
    #[inline]
    #[must_use]
    pub const fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Returns true if `left` falls strictly inside this interval.
    #[inline]
    #[must_use]
    pub const fn strictly_contains(&self, left: i64) -> bool {
        self.left < left && left < self.right
    }
}

/// Plain node record holding the id, parent link, and coordinates.
///
/// Records of any shape embed one of these; it is also a complete
/// [`TreeNode`] on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeBase {
    /// Unique row key.
    pub id: NodeId,
    /// Parent row, `None` for a root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Tree number.
    #[serde(default)]
    pub partition: PartitionId,
    /// Depth.
    #[serde(default)]
    pub level: i64,
    /// Left boundary.
    #[serde(default)]
    pub left: i64,
    /// Right boundary.
    #[serde(default)]
    pub right: i64,
}

impl NodeBase {
    /// Creates a record with the given identity and no coordinates yet.
    #[must_use]
    pub fn new(id: NodeId, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            parent_id,
            ..Default::default()
        }
    }

    /// Creates an unsaved record whose parent is `parent_id`.
    #[must_use]
    pub fn child_of(parent_id: NodeId) -> Self {
        Self::new(NodeId::INVALID, Some(parent_id))
    }

    /// Creates an unsaved record that will become a new root.
    #[must_use]
    pub fn new_root() -> Self {
        Self::new(NodeId::INVALID, None)
    }
}

/// Typed accessor capability over the five tree fields of a record.
///
/// Implementations only provide [`base`](TreeNode::base) and
/// [`base_mut`](TreeNode::base_mut); everything else is derived.
///
/// ```rust
/// use nestset_common::types::{NodeBase, TreeNode};
///
/// #[derive(Debug, Clone)]
/// struct Department {
///     tree: NodeBase,
///     name: String,
/// }
///
/// impl TreeNode for Department {
///     fn base(&self) -> &NodeBase {
///         &self.tree
///     }
///     fn base_mut(&mut self) -> &mut NodeBase {
///         &mut self.tree
///     }
/// }
///
/// let d = Department { tree: NodeBase::new_root(), name: "dev".into() };
/// assert!(d.is_root());
/// ```
pub trait TreeNode: Clone {
    /// Borrows the embedded tree fields.
    fn base(&self) -> &NodeBase;

    /// Mutably borrows the embedded tree fields.
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Row key.
    #[inline]
    fn id(&self) -> NodeId {
        self.base().id
    }

    /// Sets the row key.
    #[inline]
    fn set_id(&mut self, id: NodeId) {
        self.base_mut().id = id;
    }

    /// Parent row, `None` for a root.
    #[inline]
    fn parent_id(&self) -> Option<NodeId> {
        self.base().parent_id
    }

    /// Sets the parent link.
    #[inline]
    fn set_parent_id(&mut self, parent_id: Option<NodeId>) {
        self.base_mut().parent_id = parent_id;
    }

    /// Tree number.
    #[inline]
    fn partition(&self) -> PartitionId {
        self.base().partition
    }

    /// Sets the tree number.
    #[inline]
    fn set_partition(&mut self, partition: PartitionId) {
        self.base_mut().partition = partition;
    }

    /// Depth, root = 1.
    #[inline]
    fn level(&self) -> i64 {
        self.base().level
    }

    /// Sets the depth.
    #[inline]
    fn set_level(&mut self, level: i64) {
        self.base_mut().level = level;
    }

    /// Left boundary.
    #[inline]
    fn left(&self) -> i64 {
        self.base().left
    }

    /// Right boundary.
    #[inline]
    fn right(&self) -> i64 {
        self.base().right
    }

    /// Sets both boundaries.
    #[inline]
    fn set_bounds(&mut self, left: i64, right: i64) {
        let base = self.base_mut();
        base.left = left;
        base.right = right;
    }

    /// Snapshot of the four derived coordinates.
    #[inline]
    fn coords(&self) -> Coords {
        let base = self.base();
        Coords {
            partition: base.partition,
            level: base.level,
            left: base.left,
            right: base.right,
        }
    }

    /// Overwrites the four derived coordinates.
    #[inline]
    fn set_coords(&mut self, coords: Coords) {
        let base = self.base_mut();
        base.partition = coords.partition;
        base.level = coords.level;
        base.left = coords.left;
        base.right = coords.right;
    }

    /// Returns true if the node has no parent.
    #[inline]
    fn is_root(&self) -> bool {
        self.parent_id().is_none()
    }

    /// Returns true if the node has a parent.
    #[inline]
    fn is_child(&self) -> bool {
        !self.is_root()
    }

    /// Returns true if the node has no descendants.
    #[inline]
    fn is_leaf(&self) -> bool {
        self.descendant_count() == 0
    }

    /// `(right - left - 1) / 2`.
    #[inline]
    fn descendant_count(&self) -> i64 {
        self.coords().descendant_count()
    }

    /// Returns true if `self` lies strictly inside `other`'s interval.
    fn is_descendant_of<O: TreeNode>(&self, other: &O, include_self: bool) -> bool {
        if include_self && self.id() == other.id() {
            return true;
        }
        if self.partition() != other.partition() {
            return false;
        }
        self.left() > other.left() && self.right() < other.right()
    }

    /// Returns true if `other` lies strictly inside `self`'s interval.
    fn is_ancestor_of<O: TreeNode>(&self, other: &O, include_self: bool) -> bool {
        if include_self && self.id() == other.id() {
            return true;
        }
        if self.partition() != other.partition() {
            return false;
        }
        self.left() < other.left() && self.right() > other.right()
    }
}

impl TreeNode for NodeBase {
    #[inline]
    fn base(&self) -> &NodeBase {
        self
    }

    #[inline]
    fn base_mut(&mut self) -> &mut NodeBase {
        self
    }
}
