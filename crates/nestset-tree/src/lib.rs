//! # nestset-tree
//!
//! Nested-set (modified preorder tree traversal) maintenance over a flat
//! row store.
//!
//! Each row stores a parent link plus `partition`, `level`, `left` and
//! `right`. Subtree and ancestor queries become range predicates on those
//! columns; every mutation keeps them consistent with bulk statements:
//!
//! - [`space`]: gap opening and closing inside a partition, partition shifts
//! - [`insert`], [`moves`], [`delete`]: the mutation engines
//! - [`rebuild`]: recomputes coordinates from parent links alone
//! - [`query`]: read-only range queries
//! - [`verify`]: consistency checks returning typed [`Violation`]s
//! - [`TreeManager`]: locking, configuration and verification around the
//!   engines
//!
//! ## Example
//!
//! ```rust
//! use nestset_common::types::{NodeBase, Position};
//! use nestset_common::TreeConfig;
//! use nestset_store::MemoryStore;
//! use nestset_tree::TreeManager;
//!
//! let tree = TreeManager::new(MemoryStore::<NodeBase>::new(), TreeConfig::default()).unwrap();
//!
//! let root = tree.create_node(NodeBase::new_root()).unwrap().node;
//! let a = tree.create_node(NodeBase::child_of(root.id)).unwrap().node;
//! let b = tree.create_node(NodeBase::child_of(root.id)).unwrap().node;
//!
//! let moved = tree.move_node(&b, Some(&a), Position::FirstChild).unwrap();
//! assert_eq!((moved.node.left, moved.node.right), (3, 4));
//!
//! let root = tree.refresh_node(&root).unwrap();
//! assert_eq!(tree.get_descendants(&root, false).unwrap().len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delete;
pub mod insert;
pub mod manager;
pub mod moves;
pub mod query;
pub mod rebuild;
pub mod space;
pub mod verify;

pub use insert::Inserted;
pub use manager::TreeManager;
pub use moves::Moved;
pub use rebuild::RebuildStats;
pub use verify::Violation;
