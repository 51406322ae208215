//! Predicate expressions over columns
//!
//! A `Condition` is the storage-independent WHERE clause. The memory
//! backend evaluates it directly; the PostgreSQL backend renders it to SQL.
//! Comparisons follow SQL semantics: any comparison against NULL is false,
//! use `IsNull`/`IsNotNull` to test for it.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::value::{Row, Value};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equal => write!(f, "="),
            Operator::NotEqual => write!(f, "<>"),
            Operator::GreaterThan => write!(f, ">"),
            Operator::GreaterThanOrEqual => write!(f, ">="),
            Operator::LessThan => write!(f, "<"),
            Operator::LessThanOrEqual => write!(f, "<="),
            Operator::Like => write!(f, "LIKE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches every row
    All,
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::All
    }
}

impl Condition {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Equal, value)
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::NotEqual, value)
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::GreaterThan, value)
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::GreaterThanOrEqual, value)
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::LessThan, value)
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::LessThanOrEqual, value)
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self::compare(column, Operator::Like, pattern)
    }

    pub fn compare(column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column: column.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Condition::IsNull(column.to_string())
    }

    pub fn is_not_null(column: &str) -> Self {
        Condition::IsNotNull(column.to_string())
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Hash condition: every column equals its value, null values become
    /// `IS NULL`
    pub fn from_row(row: &Row) -> Self {
        let parts: Vec<Condition> = row
            .iter()
            .map(|(column, value)| {
                if value.is_null() {
                    Condition::is_null(column)
                } else {
                    Condition::eq(column, value.clone())
                }
            })
            .collect();
        Condition::All.and(Condition::And(parts))
    }

    /// Conjunction that flattens nested `And`s and drops `All`
    pub fn and(self, other: Condition) -> Self {
        let mut parts = Vec::new();
        for condition in [self, other] {
            match condition {
                Condition::All => {}
                Condition::And(inner) => parts.extend(inner.into_iter().filter(|c| *c != Condition::All)),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Condition::All,
            1 => parts.remove(0),
            _ => Condition::And(parts),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::All, _) | (_, Condition::All) => Condition::All,
            (Condition::Or(mut left), Condition::Or(right)) => {
                left.extend(right);
                Condition::Or(left)
            }
            (Condition::Or(mut left), right) => {
                left.push(right);
                Condition::Or(left)
            }
            (left, right) => Condition::Or(vec![left, right]),
        }
    }

    /// Column names referenced by the condition
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::All => {}
            Condition::Compare { column, .. }
            | Condition::In { column, .. }
            | Condition::IsNull(column)
            | Condition::IsNotNull(column) => out.push(column),
            Condition::And(parts) | Condition::Or(parts) => {
                for part in parts {
                    part.collect_columns(out);
                }
            }
            Condition::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Evaluate against an in-memory row; missing columns read as null
    pub fn matches(&self, row: &Row) -> bool {
        let get = |column: &str| row.get(column).unwrap_or(&Value::Null);
        match self {
            Condition::All => true,
            Condition::Compare {
                column,
                operator,
                value,
            } => {
                let current = get(column);
                if current.is_null() || value.is_null() {
                    return false;
                }
                match operator {
                    Operator::Like => like_matches(current, value),
                    _ => {
                        let ordering = current.compare(value);
                        match operator {
                            Operator::Equal => ordering == Ordering::Equal,
                            Operator::NotEqual => ordering != Ordering::Equal,
                            Operator::GreaterThan => ordering == Ordering::Greater,
                            Operator::GreaterThanOrEqual => ordering != Ordering::Less,
                            Operator::LessThan => ordering == Ordering::Less,
                            Operator::LessThanOrEqual => ordering != Ordering::Greater,
                            Operator::Like => unreachable!(),
                        }
                    }
                }
            }
            Condition::In { column, values } => {
                let current = get(column);
                !current.is_null()
                    && values
                        .iter()
                        .any(|v| !v.is_null() && current.compare(v) == Ordering::Equal)
            }
            Condition::IsNull(column) => get(column).is_null(),
            Condition::IsNotNull(column) => !get(column).is_null(),
            Condition::And(parts) => parts.iter().all(|c| c.matches(row)),
            Condition::Or(parts) => parts.iter().any(|c| c.matches(row)),
            Condition::Not(inner) => !inner.matches(row),
        }
    }
}

/// SQL LIKE: `%` is any run of characters, `_` any single character
fn like_matches(value: &Value, pattern: &Value) -> bool {
    let (Some(text), Some(pattern)) = (value_text(value), value_text(pattern)) else {
        return false;
    };
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
        .map(|re| re.is_match(&text))
        .unwrap_or(false)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Binary(_) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row;

    fn sample() -> Row {
        row([
            ("id", Value::Integer(3)),
            ("name", Value::from("Alice")),
            ("image", Value::Null),
        ])
    }

    #[test]
    fn test_compare_operators() {
        let r = sample();
        assert!(Condition::eq("id", 3).matches(&r));
        assert!(Condition::gt("id", 2).matches(&r));
        assert!(!Condition::lt("id", 3).matches(&r));
        assert!(Condition::lte("id", 3.0).matches(&r));
        assert!(Condition::ne("name", "Bob").matches(&r));
    }

    #[test]
    fn test_null_comparisons_are_false() {
        let r = sample();
        assert!(!Condition::eq("image", Value::Null).matches(&r));
        assert!(!Condition::ne("image", "x").matches(&r));
        assert!(Condition::is_null("image").matches(&r));
        assert!(Condition::is_null("missing").matches(&r));
    }

    #[test]
    fn test_like_and_in() {
        let r = sample();
        assert!(Condition::like("name", "Al%").matches(&r));
        assert!(Condition::like("name", "_lice").matches(&r));
        assert!(!Condition::like("name", "al%").matches(&r));
        assert!(Condition::is_in("id", [1, 3, 5]).matches(&r));
        assert!(!Condition::is_in("id", [1, 5]).matches(&r));
    }

    #[test]
    fn test_from_row_builds_hash_condition() {
        let condition = Condition::from_row(&row([("id", Value::Integer(3)), ("image", Value::Null)]));
        assert_eq!(
            condition,
            Condition::And(vec![Condition::eq("id", 3), Condition::is_null("image")])
        );
        assert!(condition.matches(&sample()));
    }

    #[test]
    fn test_and_flattens() {
        let condition = Condition::All
            .and(Condition::eq("a", 1))
            .and(Condition::eq("b", 2))
            .and(Condition::All);
        assert_eq!(
            condition,
            Condition::And(vec![Condition::eq("a", 1), Condition::eq("b", 2)])
        );
        assert_eq!(Condition::All.and(Condition::All), Condition::All);
    }

    #[test]
    fn test_or_and_not() {
        let r = sample();
        assert!(Condition::eq("id", 1).or(Condition::eq("id", 3)).matches(&r));
        assert!(Condition::negate(Condition::eq("id", 1)).matches(&r));
        assert_eq!(Condition::eq("id", 1).or(Condition::All), Condition::All);
    }

    #[test]
    fn test_columns_lists_references() {
        let condition = Condition::eq("a", 1).and(Condition::negate(Condition::is_null("b")));
        assert_eq!(condition.columns(), vec!["a", "b"]);
    }
}
