//! Row predicates and orderings.
//!
//! Predicates are plain values rather than closures so that a relational
//! backend can render them as a `WHERE` clause; the [`fmt::Display`] output
//! is that rendering. [`Predicate::matches`] is the in-memory evaluation
//! used by [`MemoryStore`](crate::MemoryStore).

use std::cmp::Ordering;
use std::fmt;

use nestset_common::types::{NodeId, PartitionId, TreeNode};

/// A numeric coordinate column that supports range comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coordinate {
    /// Depth.
    Level,
    /// Left boundary.
    Left,
    /// Right boundary.
    Right,
}

impl Coordinate {
    /// Reads the column from a node.
    #[inline]
    pub fn read<N: TreeNode>(self, node: &N) -> i64 {
        match self {
            Coordinate::Level => node.level(),
            Coordinate::Left => node.left(),
            Coordinate::Right => node.right(),
        }
    }

    /// Column name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Coordinate::Level => "level",
            Coordinate::Left => "left",
            Coordinate::Right => "right",
        }
    }
}

/// Comparison operator for [`Predicate::Cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

impl CmpOp {
    #[inline]
    fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "=",
        }
    }
}

/// A boolean condition over one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every row.
    All,
    /// `partition = p`
    Partition(PartitionId),
    /// `partition > p`
    PartitionAbove(PartitionId),
    /// `partition < p`
    PartitionBelow(PartitionId),
    /// `partition BETWEEN low AND high` (inclusive).
    PartitionBetween(PartitionId, PartitionId),
    /// `parent_id = p`, or `parent_id IS NULL` for `None`.
    Parent(Option<NodeId>),
    /// `id = x`
    Id(NodeId),
    /// `id <> x`
    NotId(NodeId),
    /// `column op value`
    Cmp {
        /// Column compared.
        column: Coordinate,
        /// Operator.
        op: CmpOp,
        /// Right-hand side.
        value: i64,
    },
    /// `column BETWEEN low AND high` (inclusive).
    Between {
        /// Column tested.
        column: Coordinate,
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },
    /// `right - left = 1`
    Leaf,
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// `column op value`.
    #[must_use]
    pub const fn cmp(column: Coordinate, op: CmpOp, value: i64) -> Self {
        Predicate::Cmp { column, op, value }
    }

    /// `left BETWEEN low AND high`.
    #[must_use]
    pub const fn left_between(low: i64, high: i64) -> Self {
        Predicate::Between {
            column: Coordinate::Left,
            low,
            high,
        }
    }

    /// `right BETWEEN low AND high`.
    #[must_use]
    pub const fn right_between(low: i64, high: i64) -> Self {
        Predicate::Between {
            column: Coordinate::Right,
            low,
            high,
        }
    }

    /// `left > value`.
    #[must_use]
    pub const fn left_above(value: i64) -> Self {
        Predicate::cmp(Coordinate::Left, CmpOp::Gt, value)
    }

    /// `right > value`.
    #[must_use]
    pub const fn right_above(value: i64) -> Self {
        Predicate::cmp(Coordinate::Right, CmpOp::Gt, value)
    }

    /// `parent_id IS NULL`.
    #[must_use]
    pub const fn roots() -> Self {
        Predicate::Parent(None)
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Disjunction of `self` and `other`.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (a, b) => Predicate::Or(vec![a, b]),
        }
    }

    /// Evaluates the predicate against a row.
    pub fn matches<N: TreeNode>(&self, node: &N) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Partition(p) => node.partition() == *p,
            Predicate::PartitionAbove(p) => node.partition() > *p,
            Predicate::PartitionBelow(p) => node.partition() < *p,
            Predicate::PartitionBetween(low, high) => {
                node.partition() >= *low && node.partition() <= *high
            }
            Predicate::Parent(parent) => node.parent_id() == *parent,
            Predicate::Id(id) => node.id() == *id,
            Predicate::NotId(id) => node.id() != *id,
            Predicate::Cmp { column, op, value } => op.eval(column.read(node), *value),
            Predicate::Between { column, low, high } => {
                let v = column.read(node);
                v >= *low && v <= *high
            }
            Predicate::Leaf => node.right() - node.left() == 1,
            Predicate::And(parts) => parts.iter().all(|p| p.matches(node)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(node)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All => write!(f, "TRUE"),
            Predicate::Partition(p) => write!(f, "partition = {}", p),
            Predicate::PartitionAbove(p) => write!(f, "partition > {}", p),
            Predicate::PartitionBelow(p) => write!(f, "partition < {}", p),
            Predicate::PartitionBetween(low, high) => {
                write!(f, "partition BETWEEN {} AND {}", low, high)
            }
            Predicate::Parent(None) => write!(f, "parent_id IS NULL"),
            Predicate::Parent(Some(id)) => write!(f, "parent_id = {}", id),
            Predicate::Id(id) => write!(f, "id = {}", id),
            Predicate::NotId(id) => write!(f, "id <> {}", id),
            Predicate::Cmp { column, op, value } => {
                write!(f, "{} {} {}", column.name(), op.symbol(), value)
            }
            Predicate::Between { column, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", column.name(), low, high)
            }
            Predicate::Leaf => write!(f, "right - left = 1"),
            Predicate::And(parts) => write_joined(f, parts, " AND "),
            Predicate::Or(parts) => write_joined(f, parts, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}

/// A column usable as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Row key.
    Id,
    /// Tree number.
    Partition,
    /// Depth.
    Level,
    /// Left boundary.
    Left,
    /// Right boundary.
    Right,
}

impl Column {
    fn compare<N: TreeNode>(self, a: &N, b: &N) -> Ordering {
        match self {
            Column::Id => a.id().cmp(&b.id()),
            Column::Partition => a.partition().cmp(&b.partition()),
            Column::Level => a.level().cmp(&b.level()),
            Column::Left => a.left().cmp(&b.left()),
            Column::Right => a.right().cmp(&b.right()),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Partition => "partition",
            Column::Level => "level",
            Column::Left => "left",
            Column::Right => "right",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Sort order for ordered scans.
///
/// Rows that compare equal on every key are ordered by ascending id, so
/// scans are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<(Column, Direction)>,
}

impl OrderBy {
    /// Ascending by `column`.
    #[must_use]
    pub fn asc(column: Column) -> Self {
        Self {
            keys: vec![(column, Direction::Asc)],
        }
    }

    /// Descending by `column`.
    #[must_use]
    pub fn desc(column: Column) -> Self {
        Self {
            keys: vec![(column, Direction::Desc)],
        }
    }

    /// Adds an ascending tie-breaker.
    #[must_use]
    pub fn then_asc(mut self, column: Column) -> Self {
        self.keys.push((column, Direction::Asc));
        self
    }

    /// Adds a descending tie-breaker.
    #[must_use]
    pub fn then_desc(mut self, column: Column) -> Self {
        self.keys.push((column, Direction::Desc));
        self
    }

    /// Sort keys in priority order.
    pub fn keys(&self) -> &[(Column, Direction)] {
        &self.keys
    }

    /// Compares two rows.
    pub fn compare<N: TreeNode>(&self, a: &N, b: &N) -> Ordering {
        for (column, direction) in &self.keys {
            let ord = column.compare(a, b);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id().cmp(&b.id())
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, direction)) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let dir = match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            write!(f, "{} {}", column.name(), dir)?;
        }
        Ok(())
    }
}
