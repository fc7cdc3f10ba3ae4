//! Placement of a node relative to an existing target node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NestError;

/// Where a node lands relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    /// After the target's existing children.
    LastChild,
    /// Before the target's existing children.
    FirstChild,
    /// Immediately before the target, as its sibling.
    Left,
    /// Immediately after the target, as its sibling.
    Right,
}

impl Position {
    /// All positions, in declaration order.
    pub const ALL: [Position; 4] = [
        Position::LastChild,
        Position::FirstChild,
        Position::Left,
        Position::Right,
    ];

    /// Returns true for `LastChild` and `FirstChild`.
    #[inline]
    #[must_use]
    pub const fn is_child(self) -> bool {
        matches!(self, Position::LastChild | Position::FirstChild)
    }

    /// Returns true for `Left` and `Right`.
    #[inline]
    #[must_use]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Position::Left | Position::Right)
    }

    /// Canonical spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Position::LastChild => "last-child",
            Position::FirstChild => "first-child",
            Position::Left => "left",
            Position::Right => "right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = NestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-child" => Ok(Position::LastChild),
            "first-child" => Ok(Position::FirstChild),
            "left" => Ok(Position::Left),
            "right" => Ok(Position::Right),
            other => Err(NestError::UnsupportedPosition {
                position: other.to_string(),
            }),
        }
    }
}
