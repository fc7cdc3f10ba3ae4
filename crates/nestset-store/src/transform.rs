//! Piecewise coordinate transforms for bulk updates.
//!
//! A [`Transform`] is the declarative form of
//!
//! ```text
//! UPDATE nodes SET
//!     level     = CASE WHEN <c1> THEN level + d1 ... ELSE level END,
//!     partition = CASE WHEN <c2> THEN p2 ... ELSE partition END,
//!     left      = CASE WHEN <c3> THEN left + d3 WHEN <c4> THEN left + d4 ELSE left END,
//!     right     = CASE ... END
//! WHERE <scope>
//! ```
//!
//! Every condition sees the row as it was before the statement, and the
//! first matching case of a column wins.

use std::fmt;

use nestset_common::types::{Coords, PartitionId, TreeNode};

use crate::predicate::Predicate;

/// One `WHEN <cond> THEN column + delta` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    /// Condition on the pre-update row.
    pub when: Predicate,
    /// Signed amount added to the column.
    pub delta: i64,
}

/// What a partition arm does to the row's partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAction {
    /// Assign a fixed partition.
    Set(PartitionId),
    /// Renumber by a signed amount.
    Shift(i64),
}

/// One arm of the partition column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCase {
    /// Condition on the pre-update row.
    pub when: Predicate,
    /// Action taken when it holds.
    pub action: PartitionAction,
}

/// A set of per-column piecewise updates applied in one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transform {
    level: Vec<Case>,
    partition: Vec<PartitionCase>,
    left: Vec<Case>,
    right: Vec<Case>,
}

impl Transform {
    /// Creates an empty transform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a level arm.
    #[must_use]
    pub fn level(mut self, when: Predicate, delta: i64) -> Self {
        self.level.push(Case { when, delta });
        self
    }

    /// Adds a partition arm.
    #[must_use]
    pub fn partition(mut self, when: Predicate, action: PartitionAction) -> Self {
        self.partition.push(PartitionCase { when, action });
        self
    }

    /// Adds a left-boundary arm.
    #[must_use]
    pub fn left(mut self, when: Predicate, delta: i64) -> Self {
        self.left.push(Case { when, delta });
        self
    }

    /// Adds a right-boundary arm.
    #[must_use]
    pub fn right(mut self, when: Predicate, delta: i64) -> Self {
        self.right.push(Case { when, delta });
        self
    }

    /// Adds the same arm to both boundaries.
    #[must_use]
    pub fn bounds(self, when: Predicate, delta: i64) -> Self {
        self.left(when.clone(), delta).right(when, delta)
    }

    /// Returns true if no column is touched.
    pub fn is_empty(&self) -> bool {
        self.level.is_empty()
            && self.partition.is_empty()
            && self.left.is_empty()
            && self.right.is_empty()
    }

    /// Computes the row's coordinates after the statement.
    pub fn apply<N: TreeNode>(&self, node: &N) -> Coords {
        let old = node.coords();
        let partition = match self.partition.iter().find(|c| c.when.matches(node)) {
            Some(PartitionCase {
                action: PartitionAction::Set(p),
                ..
            }) => *p,
            Some(PartitionCase {
                action: PartitionAction::Shift(delta),
                ..
            }) => old.partition.offset(*delta),
            None => old.partition,
        };
        Coords {
            partition,
            level: old.level + first_delta(&self.level, node),
            left: old.left + first_delta(&self.left, node),
            right: old.right + first_delta(&self.right, node),
        }
    }
}

fn first_delta<N: TreeNode>(cases: &[Case], node: &N) -> i64 {
    cases
        .iter()
        .find(|c| c.when.matches(node))
        .map_or(0, |c| c.delta)
}

fn write_cases(f: &mut fmt::Formatter<'_>, column: &str, cases: &[Case]) -> fmt::Result {
    write!(f, "{} = CASE", column)?;
    for case in cases {
        if case.delta < 0 {
            write!(f, " WHEN {} THEN {} - {}", case.when, column, -case.delta)?;
        } else {
            write!(f, " WHEN {} THEN {} + {}", case.when, column, case.delta)?;
        }
    }
    write!(f, " ELSE {} END", column)
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SET")?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if first {
                first = false;
                write!(f, " ")
            } else {
                write!(f, ", ")
            }
        };
        if !self.level.is_empty() {
            sep(f)?;
            write_cases(f, "level", &self.level)?;
        }
        if !self.partition.is_empty() {
            sep(f)?;
            write!(f, "partition = CASE")?;
            for case in &self.partition {
                match case.action {
                    PartitionAction::Set(p) => write!(f, " WHEN {} THEN {}", case.when, p)?,
                    PartitionAction::Shift(d) => {
                        write!(f, " WHEN {} THEN partition + {}", case.when, d)?
                    }
                }
            }
            write!(f, " ELSE partition END")?;
        }
        if !self.left.is_empty() {
            sep(f)?;
            write_cases(f, "left", &self.left)?;
        }
        if !self.right.is_empty() {
            sep(f)?;
            write_cases(f, "right", &self.right)?;
        }
        Ok(())
    }
}
