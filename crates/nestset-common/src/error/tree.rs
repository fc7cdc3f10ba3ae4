//! Tree error types.
//!
//! Engines fail fast with the first error they hit and never roll back
//! partially applied statements themselves.

use std::fmt;
use thiserror::Error;

use crate::types::NodeId;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Invalid argument provided.
    InvalidArgument = 0x0001,

    // Tree errors (0x0100 - 0x01FF)
    /// No row with the given id.
    NodeNotFound = 0x0100,
    /// Position outside the recognized values.
    UnsupportedPosition = 0x0101,
    /// Node targeted at itself.
    SelfReference = 0x0102,
    /// Target lies inside the moving subtree.
    Cycle = 0x0103,
    /// Coordinates violate the nested-set invariants.
    Corruption = 0x0104,

    // Store errors (0x0200 - 0x02FF)
    /// Error raised by the backing store.
    Store = 0x0200,
    /// I/O error.
    Io = 0x0201,

    // Concurrency errors (0x0300 - 0x03FF)
    /// Lock acquisition timed out.
    LockTimeout = 0x0300,

    // Configuration errors (0x0400 - 0x04FF)
    /// Invalid configuration.
    InvalidConfig = 0x0400,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Tree",
            0x02 => "Store",
            0x03 => "Concurrency",
            0x04 => "Config",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for nestset.
///
/// # Example
///
/// ```rust
/// use nestset_common::error::{ErrorCode, NestError};
/// use nestset_common::types::NodeId;
///
/// let err = NestError::NodeNotFound { id: NodeId::new(3) };
/// assert_eq!(err.code(), ErrorCode::NodeNotFound);
/// assert_eq!(err.to_string(), "node 3 not found");
/// ```
#[derive(Debug, Error)]
pub enum NestError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Node or target is not addressable.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Tree Errors
    // ==========================================================================
    /// The id has no backing row.
    #[error("node {id} not found")]
    NodeNotFound {
        /// The missing node.
        id: NodeId,
    },

    /// Position outside the four recognized values.
    #[error("unsupported position '{position}'")]
    UnsupportedPosition {
        /// The rejected spelling.
        position: String,
    },

    /// A node was targeted at itself.
    #[error("node {node} may not be made a child or sibling of itself")]
    SelfReference {
        /// The node.
        node: NodeId,
    },

    /// The target is one of the node's own descendants.
    #[error("node {node} may not be moved under or beside its descendant {target}")]
    Cycle {
        /// The moving node.
        node: NodeId,
        /// The descendant it was aimed at.
        target: NodeId,
    },

    /// Stored coordinates violate the nested-set invariants.
    #[error("tree corruption detected: {message}")]
    Corruption {
        /// Description of the violation.
        message: String,
    },

    // ==========================================================================
    // Store Errors
    // ==========================================================================
    /// Error raised by the backing store, passed through unchanged.
    #[error("store error: {source}")]
    Store {
        /// The store's own error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Concurrency Errors
    // ==========================================================================
    /// Partition locks were not granted in time.
    #[error("timed out after {waited_ms}ms waiting for tree locks")]
    LockTimeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl NestError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::UnsupportedPosition { .. } => ErrorCode::UnsupportedPosition,
            Self::SelfReference { .. } => ErrorCode::SelfReference,
            Self::Cycle { .. } => ErrorCode::Cycle,
            Self::Corruption { .. } => ErrorCode::Corruption,
            Self::Store { .. } => ErrorCode::Store,
            Self::Io { .. } => ErrorCode::Io,
            Self::LockTimeout { .. } => ErrorCode::LockTimeout,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Returns true for the validation failures raised before any write.
    #[must_use]
    pub const fn is_rejected_move(&self) -> bool {
        matches!(self, Self::SelfReference { .. } | Self::Cycle { .. })
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    #[must_use]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Wraps a store error.
    #[must_use]
    pub fn store<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            source: Box::new(source),
        }
    }
}
