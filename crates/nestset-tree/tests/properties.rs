//! Property-based tests for rebuild and the mutation engines.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::sample::Index;

use nestset_common::types::{NodeBase, NodeId, PartitionId, Position, TreeNode};
use nestset_common::TreeConfig;
use nestset_store::{Direction, MemoryStore, NodeStore};
use nestset_tree::query::get_ancestors;
use nestset_tree::TreeManager;

type Manager = TreeManager<MemoryStore<NodeBase>>;

fn manager() -> Manager {
    TreeManager::new(MemoryStore::new(), TreeConfig::for_testing()).unwrap()
}

// =============================================================================
// Strategies
// =============================================================================

/// Parent of row `i` as an index below `i`, or `None` for a root. Row 0 is
/// always a root.
fn parent_links() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec((0u8..5, any::<Index>()), 1..60).prop_map(|picks| {
        picks
            .into_iter()
            .enumerate()
            .map(|(i, (roll, index))| {
                if i == 0 || roll == 0 {
                    None
                } else {
                    Some(index.index(i))
                }
            })
            .collect()
    })
}

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::LastChild),
        Just(Position::FirstChild),
        Just(Position::Left),
        Just(Position::Right),
    ]
}

#[derive(Clone, Debug)]
enum TreeOp {
    CreateRoot,
    CreateChild { parent: Index },
    Insert { target: Index, position: Position },
    Move { node: Index, target: Option<Index>, position: Position },
    Delete { node: Index },
}

fn tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        1 => Just(TreeOp::CreateRoot),
        3 => any::<Index>().prop_map(|parent| TreeOp::CreateChild { parent }),
        2 => (any::<Index>(), position())
            .prop_map(|(target, position)| TreeOp::Insert { target, position }),
        4 => (any::<Index>(), prop::option::weighted(0.9, any::<Index>()), position())
            .prop_map(|(node, target, position)| TreeOp::Move { node, target, position }),
        1 => any::<Index>().prop_map(|node| TreeOp::Delete { node }),
    ]
}

fn apply(tree: &Manager, op: &TreeOp) {
    let ids: Vec<NodeId> = tree.store().all().iter().map(|n| n.id).collect();
    if ids.is_empty() {
        tree.create_node(NodeBase::new_root()).unwrap();
        return;
    }
    let pick = |index: &Index| *index.get(&ids);

    match op {
        TreeOp::CreateRoot => {
            tree.create_node(NodeBase::new_root()).unwrap();
        }
        TreeOp::CreateChild { parent } => {
            tree.create_node(NodeBase::child_of(pick(parent))).unwrap();
        }
        TreeOp::Insert { target, position } => {
            let target = tree.get_node(pick(target)).unwrap();
            tree.insert_node(NodeBase::default(), &target, *position).unwrap();
        }
        TreeOp::Move {
            node,
            target,
            position,
        } => {
            let result = tree.move_node_by_id(pick(node), target.as_ref().map(pick), *position);
            if let Err(err) = result {
                assert!(err.is_rejected_move(), "unexpected error: {err}");
            }
        }
        TreeOp::Delete { node } => {
            tree.delete_node_by_id(pick(node)).unwrap();
        }
    }
}

/// `(parent, level, left, right)` by id.
fn shape(tree: &Manager) -> HashMap<NodeId, (Option<NodeId>, i64, i64, i64)> {
    tree.store()
        .all()
        .into_iter()
        .map(|n| (n.id, (n.parent_id, n.level, n.left, n.right)))
        .collect()
}

// =============================================================================
// Rebuild properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Rebuilding from parent links yields a consistent forest whose
    /// containment reproduces every parent link.
    #[test]
    fn rebuild_reproduces_parent_links(links in parent_links()) {
        let tree = manager();
        for parent in &links {
            let parent = parent.map(|j| NodeId::new(j as u64 + 1));
            tree.store().insert(NodeBase::new(NodeId::INVALID, parent)).unwrap();
        }

        let stats = tree.rebuild().unwrap();
        prop_assert_eq!(stats.nodes, links.len());
        prop_assert_eq!(stats.trees, links.iter().filter(|p| p.is_none()).count());
        prop_assert!(tree.verify_forest().unwrap().is_empty());

        for node in tree.store().all() {
            let ancestors = get_ancestors(tree.store(), &node, false, Direction::Asc).unwrap();
            prop_assert_eq!(ancestors.last().map(|a| a.id), node.parent_id);
            prop_assert_eq!(node.level(), ancestors.len() as i64 + 1);
        }
    }

    /// Siblings keep their creation order when rebuilt from scratch.
    #[test]
    fn rebuild_orders_imported_siblings_by_id(links in parent_links()) {
        let tree = manager();
        for parent in &links {
            let parent = parent.map(|j| NodeId::new(j as u64 + 1));
            tree.store().insert(NodeBase::new(NodeId::INVALID, parent)).unwrap();
        }
        tree.rebuild().unwrap();

        for node in tree.store().all() {
            let children = tree.get_children(&node).unwrap();
            prop_assert!(children.windows(2).all(|w| w[0].id < w[1].id));
        }
        let roots = tree.root_nodes().unwrap();
        prop_assert!(roots.windows(2).all(|w| w[0].id < w[1].id));
        prop_assert_eq!(
            roots.last().map(|r| r.partition()),
            Some(PartitionId::new(roots.len() as u64))
        );
    }
}

// =============================================================================
// Mutation properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Any sequence of mutations keeps the forest consistent, and a rebuild
    /// afterwards only renumbers partitions.
    #[test]
    fn mutations_preserve_invariants(ops in prop::collection::vec(tree_op(), 1..40)) {
        let tree = manager();
        for op in &ops {
            apply(&tree, op);
            let structural: Vec<_> = tree
                .verify_forest()
                .unwrap()
                .into_iter()
                .filter(|v| v.is_structural())
                .collect();
            prop_assert!(structural.is_empty(), "{:?} broke the forest: {:?}", op, structural);
        }

        let before = shape(&tree);
        let mut partitions: Vec<(PartitionId, NodeId)> =
            tree.root_nodes().unwrap().iter().map(|r| (r.partition(), r.id)).collect();
        partitions.sort();

        tree.rebuild().unwrap();
        prop_assert_eq!(shape(&tree), before);
        prop_assert!(tree.verify_forest().unwrap().is_empty());

        let after: Vec<NodeId> = tree.root_nodes().unwrap().iter().map(|r| r.id).collect();
        let expected: Vec<NodeId> = partitions.into_iter().map(|(_, id)| id).collect();
        prop_assert_eq!(after, expected);
    }

    /// Deleting a subtree removes exactly its rows.
    #[test]
    fn delete_removes_exactly_the_subtree(
        ops in prop::collection::vec(tree_op(), 1..30),
        victim in any::<Index>(),
    ) {
        let tree = manager();
        for op in &ops {
            apply(&tree, op);
        }
        let ids: Vec<NodeId> = tree.store().all().iter().map(|n| n.id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let victim = tree.get_node(*victim.get(&ids)).unwrap();
        let subtree: Vec<NodeId> = tree
            .get_descendants(&victim, true)
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();

        let removed = tree.delete_node(&victim).unwrap();
        prop_assert_eq!(removed, subtree.len());
        prop_assert_eq!(tree.store().len(), ids.len() - subtree.len());
        for id in subtree {
            prop_assert!(tree.find_node(id).unwrap().is_none());
        }
        let structural = tree
            .verify_forest()
            .unwrap()
            .into_iter()
            .filter(|v| v.is_structural())
            .count();
        prop_assert_eq!(structural, 0);
    }
}
