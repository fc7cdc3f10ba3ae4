//! The store contract the tree engines run against.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{NodeBase, NodeId, PartitionId, TreeNode};

use crate::predicate::{OrderBy, Predicate};
use crate::transform::Transform;

/// Subset of tree fields written by [`NodeStore::update_fields`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldSet(u8);

impl FieldSet {
    /// No fields.
    pub const NONE: FieldSet = FieldSet(0);
    /// `parent_id`.
    pub const PARENT: FieldSet = FieldSet(1);
    /// `partition`.
    pub const PARTITION: FieldSet = FieldSet(1 << 1);
    /// `level`.
    pub const LEVEL: FieldSet = FieldSet(1 << 2);
    /// `left` and `right`.
    pub const BOUNDS: FieldSet = FieldSet(1 << 3);
    /// The four derived coordinates.
    pub const COORDS: FieldSet = FieldSet(0b1110);
    /// Every tree field.
    pub const ALL: FieldSet = FieldSet(0b1111);

    /// Returns true if every field of `other` is in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: FieldSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no field is selected.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Copies the selected fields from `from` onto `to`.
    pub fn copy(self, from: &NodeBase, to: &mut NodeBase) {
        if self.contains(FieldSet::PARENT) {
            to.parent_id = from.parent_id;
        }
        if self.contains(FieldSet::PARTITION) {
            to.partition = from.partition;
        }
        if self.contains(FieldSet::LEVEL) {
            to.level = from.level;
        }
        if self.contains(FieldSet::BOUNDS) {
            to.left = from.left;
            to.right = from.right;
        }
    }
}

impl BitOr for FieldSet {
    type Output = FieldSet;

    fn bitor(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 | rhs.0)
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (FieldSet::PARENT, "parent_id"),
            (FieldSet::PARTITION, "partition"),
            (FieldSet::LEVEL, "level"),
            (FieldSet::BOUNDS, "left, right"),
        ];
        let selected: Vec<&str> = names
            .iter()
            .filter(|(field, _)| self.contains(*field))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "FieldSet({})", selected.join(", "))
    }
}

/// Row storage used by the tree engines.
///
/// Every method is one statement against the backing store. Callers that
/// need atomicity across statements wrap the whole engine call in their own
/// transaction; the engines never retry or roll back.
pub trait NodeStore: Send + Sync {
    /// The record type stored in the table.
    type Node: TreeNode + Send + Sync;

    /// Reads one row by id.
    fn find_by_id(&self, id: NodeId) -> NestResult<Option<Self::Node>>;

    /// Writes a new row verbatim and returns its id.
    ///
    /// Rows carrying [`NodeId::INVALID`] get a fresh id; any other id is kept.
    fn insert(&self, node: Self::Node) -> NestResult<NodeId>;

    /// Deletes every matching row and returns how many were removed.
    fn delete_where(&self, predicate: &Predicate) -> NestResult<usize>;

    /// Applies `transform` to every row matching `scope` in one statement.
    ///
    /// Returns the number of rows the scope matched.
    fn bulk_transform(&self, scope: &Predicate, transform: &Transform) -> NestResult<usize>;

    /// Writes the selected fields of `base` onto the row with the same id.
    fn update_fields(&self, base: &NodeBase, fields: FieldSet) -> NestResult<()>;

    /// Current maximum partition in use plus one.
    fn next_partition_id(&self) -> NestResult<PartitionId>;

    /// Returns matching rows in `order`, ties broken by ascending id.
    fn scan_ordered(
        &self,
        predicate: &Predicate,
        order: &OrderBy,
        limit: Option<usize>,
    ) -> NestResult<Vec<Self::Node>>;

    /// Reads one row by id, failing with `NodeNotFound` if it is absent.
    fn get(&self, id: NodeId) -> NestResult<Self::Node> {
        self.find_by_id(id)?
            .ok_or(NestError::NodeNotFound { id })
    }

    /// Returns the first row in `order`, if any.
    fn first(&self, predicate: &Predicate, order: &OrderBy) -> NestResult<Option<Self::Node>> {
        Ok(self.scan_ordered(predicate, order, Some(1))?.into_iter().next())
    }
}

impl<S: NodeStore + ?Sized> NodeStore for Arc<S> {
    type Node = S::Node;

    fn find_by_id(&self, id: NodeId) -> NestResult<Option<Self::Node>> {
        (**self).find_by_id(id)
    }

    fn insert(&self, node: Self::Node) -> NestResult<NodeId> {
        (**self).insert(node)
    }

    fn delete_where(&self, predicate: &Predicate) -> NestResult<usize> {
        (**self).delete_where(predicate)
    }

    fn bulk_transform(&self, scope: &Predicate, transform: &Transform) -> NestResult<usize> {
        (**self).bulk_transform(scope, transform)
    }

    fn update_fields(&self, base: &NodeBase, fields: FieldSet) -> NestResult<()> {
        (**self).update_fields(base, fields)
    }

    fn next_partition_id(&self) -> NestResult<PartitionId> {
        (**self).next_partition_id()
    }

    fn scan_ordered(
        &self,
        predicate: &Predicate,
        order: &OrderBy,
        limit: Option<usize>,
    ) -> NestResult<Vec<Self::Node>> {
        (**self).scan_ordered(predicate, order, limit)
    }
}
