//! Tree manager: the locked entry point over one store.
//!
//! Every mutation runs in three steps:
//!
//! ```text
//!  plan ──▶ lock ──▶ re-plan ──┬── same ──▶ run engine ──▶ verify? ──▶ unlock
//!                              └── differs ─▶ unlock, retry
//! ```
//!
//! The plan reads the rows involved and decides which partitions the
//! operation rewrites. Operations that allocate or renumber partition ids
//! lock the whole forest. Rows are re-read by id once the locks are held,
//! so callers may pass stale copies.

use tracing::{debug, info, warn};

use nestset_common::config::TreeConfig;
use nestset_common::error::{NestError, NestResult};
use nestset_common::types::{NodeId, PartitionId, Position, TreeNode};
use nestset_store::{Direction, LockScope, NodeStore, PartitionGuard, PartitionLocks};

use crate::insert::{self, Inserted};
use crate::moves::{self, Moved};
use crate::rebuild::{self, RebuildStats};
use crate::verify::{self, Violation};
use crate::{delete, query};

/// Plans tried before falling back to the forest lock.
const MAX_PLAN_ATTEMPTS: usize = 8;

/// Serialised access to a nested-set forest.
pub struct TreeManager<S: NodeStore> {
    store: S,
    config: TreeConfig,
    locks: PartitionLocks,
}

impl<S: NodeStore> TreeManager<S> {
    /// Creates a manager over `store`.
    pub fn new(store: S, config: TreeConfig) -> NestResult<Self> {
        config.validate()?;
        let locks = PartitionLocks::new(config.lock_timeout());
        info!(tree = %config.name, verify = config.verify_after_mutation, "tree manager ready");
        Ok(Self {
            store,
            config,
            locks,
        })
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Returns the lock table.
    pub fn locks(&self) -> &PartitionLocks {
        &self.locks
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Stores `node` as a new root, or as the last child of its parent.
    pub fn create_node(&self, node: S::Node) -> NestResult<Inserted<S::Node>> {
        let parent_id = node.parent_id();
        let guard = self.acquire(|store| match parent_id {
            None => Ok(LockScope::Forest),
            Some(id) => Ok(partitions(&[store.get(id)?.partition()])),
        })?;
        let inserted = insert::create_node(&self.store, node)?;
        debug!(tree = %self.config.name, node = %inserted.node.id(), "create");
        self.after_mutation(&guard, "create")?;
        Ok(inserted)
    }

    /// Stores `node` at `position` relative to `target`.
    pub fn insert_node(
        &self,
        node: S::Node,
        target: &S::Node,
        position: Position,
    ) -> NestResult<Inserted<S::Node>> {
        let target_id = target.id();
        let guard = self.acquire(|store| {
            let target = store.get(target_id)?;
            if target.is_root() && position.is_sibling() {
                Ok(LockScope::Forest)
            } else {
                Ok(partitions(&[target.partition()]))
            }
        })?;
        let target = self.store.get(target_id)?;
        let inserted = insert::insert_node(&self.store, node, &target, position)?;
        debug!(
            tree = %self.config.name,
            node = %inserted.node.id(),
            target = %target_id,
            %position,
            "insert"
        );
        self.after_mutation(&guard, "insert")?;
        Ok(inserted)
    }

    /// Moves `node` to `position` relative to `target`, or detaches it into
    /// a new tree when `target` is `None`.
    pub fn move_node(
        &self,
        node: &S::Node,
        target: Option<&S::Node>,
        position: Position,
    ) -> NestResult<Moved<S::Node>> {
        self.move_node_by_id(node.id(), target.map(|t| t.id()), position)
    }

    /// [`TreeManager::move_node`] by id.
    pub fn move_node_by_id(
        &self,
        node_id: NodeId,
        target_id: Option<NodeId>,
        position: Position,
    ) -> NestResult<Moved<S::Node>> {
        let guard = self.acquire(|store| {
            let node = store.get(node_id)?;
            let Some(target_id) = target_id else {
                return Ok(if node.is_root() {
                    partitions(&[node.partition()])
                } else {
                    LockScope::Forest
                });
            };
            let target = store.get(target_id)?;
            if target.is_root() && position.is_sibling() {
                Ok(LockScope::Forest)
            } else {
                Ok(partitions(&[node.partition(), target.partition()]))
            }
        })?;

        let node = self.store.get(node_id)?;
        let target = target_id.map(|id| self.store.get(id)).transpose()?;
        let moved = moves::move_node(&self.store, &node, target.as_ref(), position)?;
        debug!(
            tree = %self.config.name,
            node = %node_id,
            target = ?target_id,
            %position,
            changed = moved.changed,
            "move"
        );
        if moved.changed {
            self.after_mutation(&guard, "move")?;
        }
        Ok(moved)
    }

    /// Deletes `node` and its subtree. Returns the number of rows removed.
    pub fn delete_node(&self, node: &S::Node) -> NestResult<usize> {
        self.delete_node_by_id(node.id())
    }

    /// [`TreeManager::delete_node`] by id.
    pub fn delete_node_by_id(&self, id: NodeId) -> NestResult<usize> {
        let guard = self.acquire(|store| {
            let node = store.get(id)?;
            Ok(if node.is_root() {
                LockScope::Forest
            } else {
                partitions(&[node.partition()])
            })
        })?;
        let removed = delete::delete_node(&self.store, id)?;
        debug!(tree = %self.config.name, node = %id, rows = removed, "delete");
        self.after_mutation(&guard, "delete")?;
        Ok(removed)
    }

    /// Recomputes the trees rooted in `partition` from parent links.
    pub fn partial_rebuild(&self, partition: PartitionId) -> NestResult<RebuildStats> {
        let guard = self.locks.lock_forest()?;
        let stats = rebuild::partial_rebuild(&self.store, partition)?;
        self.after_mutation(&guard, "partial rebuild")?;
        Ok(stats)
    }

    /// Recomputes every tree from parent links and compacts partitions.
    pub fn rebuild(&self) -> NestResult<RebuildStats> {
        let guard = self.locks.lock_forest()?;
        let stats = rebuild::rebuild(&self.store)?;
        self.after_mutation(&guard, "rebuild")?;
        Ok(stats)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Checks the whole forest without locking it.
    pub fn verify_forest(&self) -> NestResult<Vec<Violation>> {
        verify::verify_forest(&self.store)
    }

    /// Checks one partition without locking it.
    pub fn verify_partition(&self, partition: PartitionId) -> NestResult<Vec<Violation>> {
        verify::verify_partition(&self.store, partition)
    }

    /// Rebuilds the forest if the verifier finds anything wrong, partition
    /// gaps included. Returns `None` when the forest was already consistent.
    pub fn heal(&self) -> NestResult<Option<RebuildStats>> {
        let _guard = self.locks.lock_forest()?;
        let violations = verify::verify_forest(&self.store)?;
        if violations.is_empty() {
            return Ok(None);
        }
        warn!(
            tree = %self.config.name,
            violations = violations.len(),
            first = %violations[0],
            "forest inconsistent, rebuilding"
        );

        let stats = rebuild::rebuild(&self.store)?;
        let remaining = verify::verify_forest(&self.store)?;
        if let Some(first) = remaining.first() {
            return Err(NestError::corruption(format!(
                "rebuild left {} violations, first: {}",
                remaining.len(),
                first
            )));
        }
        Ok(Some(stats))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reads a node by id.
    pub fn find_node(&self, id: NodeId) -> NestResult<Option<S::Node>> {
        self.store.find_by_id(id)
    }

    /// Reads a node by id, failing with `NodeNotFound`.
    pub fn get_node(&self, id: NodeId) -> NestResult<S::Node> {
        self.store.get(id)
    }

    /// Re-reads `node` by id.
    pub fn refresh_node(&self, node: &S::Node) -> NestResult<S::Node> {
        query::refresh_node(&self.store, node)
    }

    /// Ancestors ordered by `left` in `direction`.
    pub fn get_ancestors(
        &self,
        node: &S::Node,
        include_self: bool,
        direction: Direction,
    ) -> NestResult<Vec<S::Node>> {
        query::get_ancestors(&self.store, node, include_self, direction)
    }

    /// Descendants in preorder.
    pub fn get_descendants(&self, node: &S::Node, include_self: bool) -> NestResult<Vec<S::Node>> {
        query::get_descendants(&self.store, node, include_self)
    }

    /// Ancestors, the node, and its descendants.
    pub fn get_family(&self, node: &S::Node) -> NestResult<Vec<S::Node>> {
        query::get_family(&self.store, node)
    }

    /// Direct children in sibling order.
    pub fn get_children(&self, node: &S::Node) -> NestResult<Vec<S::Node>> {
        query::get_children(&self.store, node)
    }

    /// Descendants without children.
    pub fn get_leaf_nodes(&self, node: &S::Node) -> NestResult<Vec<S::Node>> {
        query::get_leaf_nodes(&self.store, node)
    }

    /// Nodes sharing the node's parent.
    pub fn get_siblings(&self, node: &S::Node, include_self: bool) -> NestResult<Vec<S::Node>> {
        query::get_siblings(&self.store, node, include_self)
    }

    /// The next sibling, if any.
    pub fn get_next_sibling(&self, node: &S::Node) -> NestResult<Option<S::Node>> {
        query::get_next_sibling(&self.store, node)
    }

    /// The previous sibling, if any.
    pub fn get_previous_sibling(&self, node: &S::Node) -> NestResult<Option<S::Node>> {
        query::get_previous_sibling(&self.store, node)
    }

    /// Every root, ordered by partition.
    pub fn root_nodes(&self) -> NestResult<Vec<S::Node>> {
        query::root_nodes(&self.store)
    }

    /// The root of `partition`.
    pub fn root_node(&self, partition: PartitionId) -> NestResult<Option<S::Node>> {
        query::root_node(&self.store, partition)
    }

    /// The root of the tree holding `node`.
    pub fn get_root(&self, node: &S::Node) -> NestResult<S::Node> {
        query::get_root(&self.store, node)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Locks what `plan` asks for, retrying while the answer keeps changing
    /// between the unlocked read and the locked one.
    fn acquire<F>(&self, plan: F) -> NestResult<PartitionGuard<'_>>
    where
        F: Fn(&S) -> NestResult<LockScope>,
    {
        for attempt in 1..=MAX_PLAN_ATTEMPTS {
            let guard = match plan(&self.store)? {
                LockScope::Forest => return self.locks.lock_forest(),
                LockScope::Partitions(wanted) => self.locks.lock_partitions(&wanted)?,
            };
            if plan(&self.store)? == *guard.scope() {
                return Ok(guard);
            }
            debug!(tree = %self.config.name, attempt, "lock plan changed while waiting");
        }
        warn!(tree = %self.config.name, "lock plan unstable, taking the forest lock");
        self.locks.lock_forest()
    }

    /// Verifies what `guard` covers when `verify_after_mutation` is set.
    fn after_mutation(&self, guard: &PartitionGuard<'_>, operation: &str) -> NestResult<()> {
        if !self.config.verify_after_mutation {
            return Ok(());
        }
        let violations: Vec<Violation> = match guard.scope() {
            LockScope::Forest => verify::verify_forest(&self.store)?
                .into_iter()
                .filter(Violation::is_structural)
                .collect(),
            LockScope::Partitions(held) => {
                let mut found = Vec::new();
                for partition in held {
                    found.extend(verify::verify_partition(&self.store, *partition)?);
                }
                found
            }
        };

        match violations.first() {
            None => Ok(()),
            Some(first) => {
                warn!(
                    tree = %self.config.name,
                    operation,
                    violations = violations.len(),
                    first = %first,
                    "mutation broke the forest"
                );
                Err(NestError::corruption(format!(
                    "{} left {} violations, first: {}",
                    operation,
                    violations.len(),
                    first
                )))
            }
        }
    }
}

impl<S: NodeStore + std::fmt::Debug> std::fmt::Debug for TreeManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeManager")
            .field("name", &self.config.name)
            .field("store", &self.store)
            .finish()
    }
}

/// Partition scope in the normalized form the lock table reports.
fn partitions(ids: &[PartitionId]) -> LockScope {
    let mut wanted = ids.to_vec();
    wanted.sort();
    wanted.dedup();
    LockScope::Partitions(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestset_common::types::NodeBase;
    use nestset_common::ErrorCode;
    use nestset_store::{FieldSet, MemoryStore};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;

    fn manager() -> TreeManager<MemoryStore<NodeBase>> {
        TreeManager::new(MemoryStore::new(), TreeConfig::for_testing()).unwrap()
    }

    fn root(m: &TreeManager<MemoryStore<NodeBase>>) -> NodeBase {
        m.create_node(NodeBase::new_root()).unwrap().node
    }

    fn child(m: &TreeManager<MemoryStore<NodeBase>>, parent: &NodeBase) -> NodeBase {
        m.create_node(NodeBase::child_of(parent.id)).unwrap().node
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TreeConfig::builder().name("").build();
        let err = TreeManager::new(MemoryStore::<NodeBase>::new(), config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_stale_copies_are_reread() {
        let m = manager();
        let r = root(&m);
        let a = child(&m, &r);
        let b = child(&m, &r);

        // r is stale: (1, 2) on our side, (1, 6) in the store.
        let inserted = m.insert_node(NodeBase::default(), &r, Position::LastChild).unwrap();
        assert_eq!((inserted.node.left, inserted.node.right), (6, 7));

        let moved = m.move_node(&b, Some(&a), Position::FirstChild).unwrap();
        assert!(moved.changed);
        assert_eq!(moved.node.parent_id, Some(a.id));
        assert!(m.verify_forest().unwrap().is_empty());
    }

    #[test]
    fn test_lock_scopes() {
        let m = manager();
        let r1 = root(&m);
        let r2 = root(&m);
        let a = child(&m, &r1);
        let forest_before = m.locks().stats().forest_acquisitions.load(Ordering::Relaxed);

        m.move_node(&a, Some(&r2), Position::LastChild).unwrap();
        m.delete_node(&a).unwrap();
        assert_eq!(
            m.locks().stats().forest_acquisitions.load(Ordering::Relaxed),
            forest_before
        );

        m.move_node(&r2, Some(&r1), Position::Left).unwrap();
        assert_eq!(
            m.locks().stats().forest_acquisitions.load(Ordering::Relaxed),
            forest_before + 1
        );
    }

    #[test]
    fn test_errors_leave_forest_intact() {
        let m = manager();
        let r = root(&m);
        let a = child(&m, &r);
        let a1 = child(&m, &a);

        let err = m.move_node(&a, Some(&a1), Position::LastChild).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Cycle);
        let err = m.delete_node_by_id(NodeId::new(99)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeNotFound);
        assert!(m.verify_forest().unwrap().is_empty());
        assert_eq!(m.get_descendants(&m.refresh_node(&r).unwrap(), false).unwrap().len(), 2);
    }

    #[test]
    fn test_verify_after_mutation_reports_corruption() {
        let m = manager();
        let r = root(&m);
        let a = child(&m, &r);

        let mut broken = m.get_node(a.id).unwrap();
        broken.level = 7;
        m.store().update_fields(&broken, FieldSet::LEVEL).unwrap();

        let err = m.create_node(NodeBase::child_of(r.id)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Corruption);
    }

    #[test]
    fn test_heal() {
        let m = manager();
        let r = root(&m);
        let a = child(&m, &r);
        child(&m, &a);
        assert_eq!(m.heal().unwrap(), None);

        let mut broken = m.get_node(a.id).unwrap();
        broken.left = 40;
        m.store().update_fields(&broken, FieldSet::BOUNDS).unwrap();
        assert!(!m.verify_forest().unwrap().is_empty());

        let stats = m.heal().unwrap().unwrap();
        assert_eq!(stats.nodes, 3);
        assert!(m.verify_forest().unwrap().is_empty());
        assert_eq!(
            (m.get_node(a.id).unwrap().left, m.get_node(a.id).unwrap().right),
            (2, 5)
        );
    }

    #[test]
    fn test_concurrent_mutations_keep_forest_consistent() {
        let m = Arc::new(manager());
        let roots: Vec<NodeBase> = (0..4).map(|_| root(&m)).collect();

        let handles: Vec<_> = roots
            .into_iter()
            .map(|r| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for i in 0..10 {
                        m.create_node(NodeBase::child_of(r.id)).unwrap();
                        if i % 4 == 0 {
                            m.create_node(NodeBase::new_root()).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(m.verify_forest().unwrap().is_empty());
        assert_eq!(m.store().len(), 4 + 4 * 10 + 4 * 3);
    }
}
