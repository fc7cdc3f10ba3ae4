//! Type definitions for nestset.
//!
//! This module contains the identifiers and the node record shape shared by
//! the store and the engines.

mod ids;
mod node;
mod position;

pub use ids::{NodeId, PartitionId};
pub use node::{Coords, NodeBase, TreeNode};
pub use position::Position;
