//! Configuration for nestset.
//!
//! This module provides the configuration structure for a tree manager.

mod tree;

pub use tree::{TreeConfig, TreeConfigBuilder};
