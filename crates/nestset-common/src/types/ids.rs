//! Core identifier types for nestset.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing a row key from being mixed up with a tree number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identifier - the unique row key of a tree element.
///
/// Ids are assigned by the store on insert. `NodeId::INVALID` (zero) marks a
/// record that has not been persisted yet.
///
/// # Example
///
/// ```rust
/// use nestset_common::types::NodeId;
///
/// let node = NodeId::new(42);
/// assert_eq!(node.as_u64(), 42);
/// assert!(node.is_valid());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Invalid node ID, used for records the store has not seen yet.
    pub const INVALID: Self = Self(0);

    /// First id handed out by a fresh store.
    pub const FIRST: Self = Self(1);

    /// Creates a new `NodeId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next node ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid node ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeId(INVALID)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<NodeId> for u64 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Partition identifier - names one independent tree of the forest.
///
/// Partitions in use form the dense range `1..=N`. `PartitionId::NONE` (zero)
/// only holds imported rows a rebuild has not placed yet; it is also the
/// "before the first tree" boundary used when opening room in front of
/// partition 1.
///
/// # Example
///
/// ```rust
/// use nestset_common::types::PartitionId;
///
/// let p = PartitionId::new(3);
/// assert_eq!(p.next().as_u64(), 4);
/// assert_eq!(p.prev().as_u64(), 2);
/// assert_eq!(PartitionId::FIRST.prev(), PartitionId::NONE);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PartitionId(u64);

impl PartitionId {
    /// Boundary below the first partition; never assigned by the engines.
    pub const NONE: Self = Self(0);

    /// The partition a fresh forest's first tree receives.
    pub const FIRST: Self = Self(1);

    /// Creates a new `PartitionId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following partition.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the preceding partition, stopping at `NONE`.
    #[inline]
    #[must_use]
    pub const fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Shifts the partition number by a signed amount, clamping at `NONE`.
    #[inline]
    #[must_use]
    pub const fn offset(self, delta: i64) -> Self {
        if delta >= 0 {
            Self(self.0.saturating_add(delta.unsigned_abs()))
        } else {
            Self(self.0.saturating_sub(delta.unsigned_abs()))
        }
    }

    /// Checks if this partition can hold rows.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::NONE.0
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            write!(f, "PartitionId(NONE)")
        } else {
            write!(f, "PartitionId({})", self.0)
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PartitionId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<PartitionId> for u64 {
    #[inline]
    fn from(id: PartitionId) -> Self {
        id.0
    }
}
