//! Error handling for nestset.
//!
//! This module provides a unified error type and result alias used
//! across the store and the tree engines.

mod tree;

pub use tree::{ErrorCode, NestError};

/// Result type alias for nestset operations.
pub type NestResult<T> = std::result::Result<T, NestError>;
