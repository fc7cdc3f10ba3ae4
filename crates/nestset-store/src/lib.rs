//! # nestset-store
//!
//! The row store contract the nestset engines run against.
//!
//! - [`NodeStore`]: point reads, inserts, bulk deletes and bulk transforms,
//!   single-row field writes, ordered scans
//! - [`Predicate`], [`OrderBy`], [`Transform`]: declarative statement
//!   pieces a relational backend can render as `WHERE`, `ORDER BY` and
//!   `CASE WHEN` clauses
//! - [`MemoryStore`]: in-memory implementation
//! - [`PartitionLocks`]: forest and per-partition lock table
//!
//! ## Example
//!
//! ```rust
//! use nestset_common::types::{NodeBase, PartitionId};
//! use nestset_store::{MemoryStore, NodeStore, Predicate, Transform};
//!
//! let store = MemoryStore::<NodeBase>::new();
//! let mut root = NodeBase::new_root();
//! root.partition = PartitionId::FIRST;
//! root.level = 1;
//! root.left = 1;
//! root.right = 2;
//! store.insert(root).unwrap();
//!
//! // Open a two-slot gap after boundary 1.
//! let gap = Transform::new()
//!     .left(Predicate::left_above(1), 2)
//!     .right(Predicate::right_above(1), 2);
//! let rows = store
//!     .bulk_transform(&Predicate::Partition(PartitionId::FIRST), &gap)
//!     .unwrap();
//! assert_eq!(rows, 1);
//! assert_eq!(store.all()[0].right, 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;
pub mod memory;
pub mod predicate;
pub mod store;
pub mod transform;

pub use lock::{LockScope, LockStats, PartitionGuard, PartitionLocks};
pub use memory::{MemoryStore, StoreStats};
pub use predicate::{CmpOp, Column, Coordinate, Direction, OrderBy, Predicate};
pub use store::{FieldSet, NodeStore};
pub use transform::{Case, PartitionAction, PartitionCase, Transform};
