//! # nestset-common
//!
//! Common types, errors, and configuration for nestset.
//!
//! This crate provides the foundational types shared by the store and the
//! tree engines:
//!
//! - **Types**: identifiers (`NodeId`, `PartitionId`), the node accessor
//!   capability (`TreeNode`, `NodeBase`, `Coords`), and `Position`
//! - **Errors**: unified error handling with `NestError`
//! - **Config**: `TreeConfig`, loadable from TOML
//!
//! ## Example
//!
//! ```rust
//! use nestset_common::types::{NodeBase, NodeId, PartitionId, TreeNode};
//! use nestset_common::error::NestResult;
//!
//! fn example() -> NestResult<()> {
//!     let mut node = NodeBase::new(NodeId::new(7), None);
//!     node.set_partition(PartitionId::new(1));
//!     node.set_bounds(1, 2);
//!     assert!(node.is_root());
//!     assert!(node.is_leaf());
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::TreeConfig;
pub use error::{ErrorCode, NestError, NestResult};
pub use types::{Coords, NodeBase, NodeId, PartitionId, Position, TreeNode};
