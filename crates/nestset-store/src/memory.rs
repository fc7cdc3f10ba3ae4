//! In-memory reference store.
//!
//! `MemoryStore` keeps rows in an ordered map behind a read-write lock and
//! evaluates predicates and transforms directly. Each trait method holds
//! the lock for the whole statement, so a single bulk update is atomic
//! with respect to other callers of the same store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use tracing::trace;

use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{NodeBase, NodeId, PartitionId, TreeNode};

use crate::predicate::{OrderBy, Predicate};
use crate::store::{FieldSet, NodeStore};
use crate::transform::Transform;

/// Statement counters for a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Point reads and scans.
    pub reads: AtomicU64,
    /// Rows inserted.
    pub inserts: AtomicU64,
    /// Delete statements.
    pub deletes: AtomicU64,
    /// Bulk transform statements.
    pub bulk_statements: AtomicU64,
    /// Single-row field updates.
    pub field_updates: AtomicU64,
}

impl StoreStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read.
    pub fn record_read(&self) {
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records an insert.
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a delete statement.
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a bulk transform.
    pub fn record_bulk(&self) {
        self.bulk_statements.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Records a field update.
    pub fn record_field_update(&self) {
        self.field_updates.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Total number of writing statements.
    pub fn writes(&self) -> u64 {
        self.inserts.load(AtomicOrdering::Relaxed)
            + self.deletes.load(AtomicOrdering::Relaxed)
            + self.bulk_statements.load(AtomicOrdering::Relaxed)
            + self.field_updates.load(AtomicOrdering::Relaxed)
    }
}

/// A complete [`NodeStore`] over an in-process ordered map.
///
/// # Example
///
/// ```rust
/// use nestset_common::types::{NodeBase, NodeId};
/// use nestset_store::{MemoryStore, NodeStore};
///
/// let store = MemoryStore::<NodeBase>::new();
/// let id = store.insert(NodeBase::new_root()).unwrap();
/// assert_eq!(id, NodeId::FIRST);
/// assert_eq!(store.len(), 1);
/// ```
pub struct MemoryStore<N> {
    rows: RwLock<BTreeMap<NodeId, N>>,
    next_id: AtomicU64,
    stats: StoreStats,
}

impl<N: TreeNode> MemoryStore<N> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(NodeId::FIRST.as_u64()),
            stats: StoreStats::new(),
        }
    }

    /// Returns every row ordered by id.
    pub fn all(&self) -> Vec<N> {
        self.rows.read().values().cloned().collect()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Removes every row. Ids keep counting from where they were.
    pub fn clear(&self) {
        self.rows.write().clear();
    }

    /// Returns the statement counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl<N: TreeNode> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> NodeStore for MemoryStore<N>
where
    N: TreeNode + Send + Sync,
{
    type Node = N;

    fn find_by_id(&self, id: NodeId) -> NestResult<Option<N>> {
        self.stats.record_read();
        Ok(self.rows.read().get(&id).cloned())
    }

    fn insert(&self, mut node: N) -> NestResult<NodeId> {
        let mut rows = self.rows.write();
        let id = if node.id().is_valid() {
            if rows.contains_key(&node.id()) {
                return Err(NestError::invalid_argument(format!(
                    "node {} already exists",
                    node.id()
                )));
            }
            self.next_id
                .fetch_max(node.id().as_u64().saturating_add(1), AtomicOrdering::SeqCst);
            node.id()
        } else {
            let id = NodeId::new(self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
            node.set_id(id);
            id
        };
        rows.insert(id, node);
        self.stats.record_insert();
        Ok(id)
    }

    fn delete_where(&self, predicate: &Predicate) -> NestResult<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, node| !predicate.matches(&*node));
        let removed = before - rows.len();
        self.stats.record_delete();
        trace!(%predicate, rows = removed, "delete");
        Ok(removed)
    }

    fn bulk_transform(&self, scope: &Predicate, transform: &Transform) -> NestResult<usize> {
        let mut rows = self.rows.write();
        let mut touched = 0;
        for node in rows.values_mut() {
            if scope.matches(&*node) {
                let coords = transform.apply(&*node);
                node.set_coords(coords);
                touched += 1;
            }
        }
        self.stats.record_bulk();
        trace!(%scope, %transform, rows = touched, "bulk transform");
        Ok(touched)
    }

    fn update_fields(&self, base: &NodeBase, fields: FieldSet) -> NestResult<()> {
        let mut rows = self.rows.write();
        let node = rows
            .get_mut(&base.id)
            .ok_or(NestError::NodeNotFound { id: base.id })?;
        fields.copy(base, node.base_mut());
        self.stats.record_field_update();
        Ok(())
    }

    fn next_partition_id(&self) -> NestResult<PartitionId> {
        self.stats.record_read();
        let max = self
            .rows
            .read()
            .values()
            .map(|node| node.partition())
            .max()
            .unwrap_or(PartitionId::NONE);
        Ok(max.next())
    }

    fn scan_ordered(
        &self,
        predicate: &Predicate,
        order: &OrderBy,
        limit: Option<usize>,
    ) -> NestResult<Vec<N>> {
        self.stats.record_read();
        let mut found: Vec<N> = self
            .rows
            .read()
            .values()
            .filter(|node| predicate.matches(*node))
            .cloned()
            .collect();
        found.sort_by(|a, b| order.compare(a, b));
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}

impl<N> fmt::Debug for MemoryStore<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.rows.read().len())
            .field("next_id", &self.next_id.load(AtomicOrdering::Relaxed))
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Column;
    use crate::transform::PartitionAction;

    fn row(parent: Option<u64>, p: u64, level: i64, left: i64, right: i64) -> NodeBase {
        NodeBase {
            id: NodeId::INVALID,
            parent_id: parent.map(NodeId::new),
            partition: PartitionId::new(p),
            level,
            left,
            right,
        }
    }

    fn sample() -> MemoryStore<NodeBase> {
        let store = MemoryStore::new();
        store.insert(row(None, 1, 1, 1, 6)).unwrap();
        store.insert(row(Some(1), 1, 2, 2, 3)).unwrap();
        store.insert(row(Some(1), 1, 2, 4, 5)).unwrap();
        store.insert(row(None, 2, 1, 1, 2)).unwrap();
        store
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = sample();
        assert_eq!(store.len(), 4);
        let ids: Vec<u64> = store.all().iter().map(|n| n.id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_keeps_explicit_id() {
        let store = MemoryStore::<NodeBase>::new();
        let mut explicit = row(None, 1, 1, 1, 2);
        explicit.id = NodeId::new(10);
        assert_eq!(store.insert(explicit.clone()).unwrap(), NodeId::new(10));
        assert!(store.insert(explicit).is_err());
        assert_eq!(store.insert(row(None, 2, 1, 1, 2)).unwrap(), NodeId::new(11));
    }

    #[test]
    fn test_insert_max_explicit_id() {
        let store = MemoryStore::<NodeBase>::new();
        let mut explicit = row(None, 1, 1, 1, 2);
        explicit.id = NodeId::new(u64::MAX);
        assert_eq!(store.insert(explicit).unwrap(), NodeId::new(u64::MAX));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(NodeId::new(u64::MAX)).unwrap().right, 2);
    }

    #[test]
    fn test_bulk_transform_and_scan() {
        let store = sample();
        let scope = Predicate::Partition(PartitionId::new(1));
        let shift = Transform::new()
            .left(Predicate::left_above(3), 2)
            .right(Predicate::right_above(3), 2);
        assert_eq!(store.bulk_transform(&scope, &shift).unwrap(), 3);

        let rows = store
            .scan_ordered(&scope, &OrderBy::asc(Column::Left), None)
            .unwrap();
        let bounds: Vec<(i64, i64)> = rows.iter().map(|n| (n.left, n.right)).collect();
        assert_eq!(bounds, vec![(1, 8), (2, 3), (6, 7)]);

        // The other partition is untouched.
        assert_eq!(store.get(NodeId::new(4)).unwrap().right, 2);
    }

    #[test]
    fn test_partition_transform() {
        let store = sample();
        let renumber = Transform::new().partition(Predicate::All, PartitionAction::Shift(1));
        store
            .bulk_transform(&Predicate::PartitionAbove(PartitionId::NONE), &renumber)
            .unwrap();
        assert_eq!(store.next_partition_id().unwrap(), PartitionId::new(4));
    }

    #[test]
    fn test_delete_where() {
        let store = sample();
        let removed = store
            .delete_where(
                &Predicate::Partition(PartitionId::new(1)).and(Predicate::left_between(2, 3)),
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.find_by_id(NodeId::new(2)).unwrap().is_none());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_update_fields() {
        let store = sample();
        let mut base = store.get(NodeId::new(3)).unwrap();
        base.level = 9;
        base.left = 40;
        base.right = 41;
        store.update_fields(&base, FieldSet::BOUNDS).unwrap();
        let stored = store.get(NodeId::new(3)).unwrap();
        assert_eq!((stored.left, stored.right, stored.level), (40, 41, 2));

        let missing = NodeBase::new(NodeId::new(99), None);
        let err = store.update_fields(&missing, FieldSet::ALL).unwrap_err();
        assert_eq!(err.code(), nestset_common::ErrorCode::NodeNotFound);
    }

    #[test]
    fn test_first_and_limit() {
        let store = sample();
        let roots = store
            .scan_ordered(&Predicate::roots(), &OrderBy::desc(Column::Partition), Some(1))
            .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, NodeId::new(4));

        let first = store
            .first(&Predicate::Parent(Some(NodeId::new(1))), &OrderBy::desc(Column::Left))
            .unwrap();
        assert_eq!(first.map(|n| n.id), Some(NodeId::new(3)));
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryStore::<NodeBase>::new();
        assert!(store.is_empty());
        assert_eq!(store.next_partition_id().unwrap(), PartitionId::FIRST);
        assert!(store.get(NodeId::FIRST).is_err());
    }

    #[test]
    fn test_stats() {
        let store = sample();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().inserts.load(AtomicOrdering::Relaxed), 4);
        assert_eq!(store.stats().writes(), 4);
    }
}
