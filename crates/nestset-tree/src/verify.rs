//! Consistency verifier.
//!
//! Checks stored coordinates against the nested-set invariants without
//! changing anything. A forest with no [`Violation`]s answers every range
//! query correctly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use nestset_common::error::NestResult;
use nestset_common::types::{NodeId, PartitionId, TreeNode};
use nestset_store::{Column, NodeStore, OrderBy, Predicate};

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `left >= right`.
    EmptyInterval {
        /// Offending node.
        node: NodeId,
        /// Its left boundary.
        left: i64,
        /// Its right boundary.
        right: i64,
    },
    /// `right - left` is even.
    EvenWidth {
        /// Offending node.
        node: NodeId,
        /// Its left boundary.
        left: i64,
        /// Its right boundary.
        right: i64,
    },
    /// A boundary value is used twice in one partition.
    DuplicateBoundary {
        /// Second node using the value.
        node: NodeId,
        /// The value.
        value: i64,
    },
    /// Two intervals overlap without nesting.
    Overlap {
        /// Node whose interval crosses `other`'s right boundary.
        node: NodeId,
        /// The enclosing candidate.
        other: NodeId,
    },
    /// A partition has no root.
    MissingRoot {
        /// The partition.
        partition: PartitionId,
    },
    /// A partition has more than one root.
    MultipleRoots {
        /// The partition.
        partition: PartitionId,
        /// All roots found, by id.
        roots: Vec<NodeId>,
    },
    /// The root does not span `1 ..= 2 * rows`.
    RootSpan {
        /// The root.
        node: NodeId,
        /// Its left boundary.
        left: i64,
        /// Its right boundary.
        right: i64,
        /// Rows in the partition.
        rows: usize,
    },
    /// `level` is not the parent's level plus one.
    LevelMismatch {
        /// Offending node.
        node: NodeId,
        /// Stored level.
        level: i64,
        /// Level implied by the parent.
        expected: i64,
    },
    /// The parent is missing, in another partition, or does not enclose
    /// the node.
    ParentMismatch {
        /// Offending node.
        node: NodeId,
        /// Its parent link.
        parent: NodeId,
    },
    /// A partition id below the highest one has no rows.
    PartitionGap {
        /// The unused id.
        missing: PartitionId,
    },
}

impl Violation {
    /// Returns true for violations that break range queries.
    ///
    /// Partition gaps are left behind by ordinary moves and only matter to
    /// callers that rely on dense numbering.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Violation::PartitionGap { .. })
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::EmptyInterval { node, left, right } => {
                write!(f, "node {} has empty interval [{}, {}]", node, left, right)
            }
            Violation::EvenWidth { node, left, right } => {
                write!(f, "node {} has even-width interval [{}, {}]", node, left, right)
            }
            Violation::DuplicateBoundary { node, value } => {
                write!(f, "node {} reuses boundary {}", node, value)
            }
            Violation::Overlap { node, other } => {
                write!(f, "node {} overlaps node {} without nesting", node, other)
            }
            Violation::MissingRoot { partition } => write!(f, "partition {} has no root", partition),
            Violation::MultipleRoots { partition, roots } => {
                write!(f, "partition {} has {} roots", partition, roots.len())
            }
            Violation::RootSpan {
                node,
                left,
                right,
                rows,
            } => write!(
                f,
                "root {} spans [{}, {}] but its partition holds {} rows",
                node, left, right, rows
            ),
            Violation::LevelMismatch {
                node,
                level,
                expected,
            } => write!(f, "node {} has level {}, expected {}", node, level, expected),
            Violation::ParentMismatch { node, parent } => {
                write!(f, "node {} is not enclosed by its parent {}", node, parent)
            }
            Violation::PartitionGap { missing } => write!(f, "partition {} is unused", missing),
        }
    }
}

/// Checks one partition.
pub fn verify_partition<S: NodeStore>(store: &S, partition: PartitionId) -> NestResult<Vec<Violation>> {
    let rows = store.scan_ordered(
        &Predicate::Partition(partition),
        &OrderBy::asc(Column::Left),
        None,
    )?;
    Ok(check_partition(partition, &rows))
}

/// Checks every partition plus the density of partition ids.
pub fn verify_forest<S: NodeStore>(store: &S) -> NestResult<Vec<Violation>> {
    let rows = store.scan_ordered(
        &Predicate::All,
        &OrderBy::asc(Column::Partition).then_asc(Column::Left),
        None,
    )?;

    let mut by_partition: BTreeMap<PartitionId, Vec<S::Node>> = BTreeMap::new();
    for row in rows {
        by_partition.entry(row.partition()).or_default().push(row);
    }

    let mut violations = Vec::new();
    let mut expected = PartitionId::FIRST;
    for (partition, rows) in &by_partition {
        while expected < *partition {
            violations.push(Violation::PartitionGap { missing: expected });
            expected = expected.next();
        }
        expected = partition.next();
        violations.extend(check_partition(*partition, rows));
    }
    Ok(violations)
}

/// Checks rows of one partition sorted by `left`. An empty partition
/// passes; gaps are a forest-level property.
fn check_partition<N: TreeNode>(partition: PartitionId, rows: &[N]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if rows.is_empty() {
        return violations;
    }
    let by_id: HashMap<NodeId, &N> = rows.iter().map(|n| (n.id(), n)).collect();

    let mut seen = HashSet::new();
    for node in rows {
        let (left, right) = (node.left(), node.right());
        if left >= right {
            violations.push(Violation::EmptyInterval {
                node: node.id(),
                left,
                right,
            });
        } else if (right - left) % 2 == 0 {
            violations.push(Violation::EvenWidth {
                node: node.id(),
                left,
                right,
            });
        }
        for value in [left, right] {
            if !seen.insert(value) {
                violations.push(Violation::DuplicateBoundary {
                    node: node.id(),
                    value,
                });
            }
        }
    }

    // Laminar check: walk in left order keeping the chain of open intervals.
    let mut open: Vec<&N> = Vec::new();
    for node in rows {
        while open.last().is_some_and(|top| top.right() < node.left()) {
            open.pop();
        }
        if let Some(top) = open.last() {
            if node.right() > top.right() {
                violations.push(Violation::Overlap {
                    node: node.id(),
                    other: top.id(),
                });
            }
        }
        open.push(node);
    }

    let roots: Vec<&N> = rows.iter().filter(|n| n.is_root()).collect();
    match roots.as_slice() {
        [] => violations.push(Violation::MissingRoot { partition }),
        [root] => {
            let span = i64::try_from(rows.len()).unwrap_or(i64::MAX).saturating_mul(2);
            if root.left() != 1 || root.right() != span {
                violations.push(Violation::RootSpan {
                    node: root.id(),
                    left: root.left(),
                    right: root.right(),
                    rows: rows.len(),
                });
            }
            if root.level() != 1 {
                violations.push(Violation::LevelMismatch {
                    node: root.id(),
                    level: root.level(),
                    expected: 1,
                });
            }
        }
        _ => violations.push(Violation::MultipleRoots {
            partition,
            roots: roots.iter().map(|n| n.id()).collect(),
        }),
    }

    for node in rows {
        let Some(parent_id) = node.parent_id() else {
            continue;
        };
        let Some(parent) = by_id.get(&parent_id) else {
            violations.push(Violation::ParentMismatch {
                node: node.id(),
                parent: parent_id,
            });
            continue;
        };
        if !node.is_descendant_of(*parent, false) {
            violations.push(Violation::ParentMismatch {
                node: node.id(),
                parent: parent_id,
            });
        }
        if node.level() != parent.level() + 1 {
            violations.push(Violation::LevelMismatch {
                node: node.id(),
                level: node.level(),
                expected: parent.level() + 1,
            });
        }
    }

    violations
}
