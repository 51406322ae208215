//! Record and data-provider keys
//!
//! A key is the scalar value of a single-column primary key, the ordered
//! column/value pairs of a composite one, or a position inside a
//! collection when there is no key column at all.

use std::fmt;

use crate::error::{ModelError, OrmResult};
use crate::storage::Condition;
use crate::value::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Single-column primary key
    Scalar(Value),
    /// Composite primary key, in key-column order
    Composite(Vec<(String, Value)>),
    /// Position inside a sorted collection
    Index(usize),
}

impl Key {
    /// Build the key of `row` for the given key columns
    pub fn from_row(columns: &[String], row: &Row) -> Key {
        let value = |c: &String| row.get(c).cloned().unwrap_or(Value::Null);
        match columns {
            [single] => Key::Scalar(value(single)),
            _ => Key::Composite(columns.iter().map(|c| (c.clone(), value(c))).collect()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Key::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&[(String, Value)]> {
        match self {
            Key::Composite(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Every key value is present (non-null) and there is at least one
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Scalar(value) => !value.is_null(),
            Key::Composite(pairs) => !pairs.is_empty() && pairs.iter().all(|(_, v)| !v.is_null()),
            Key::Index(_) => true,
        }
    }

    /// Column/value pairs addressing the row identified by this key
    pub(crate) fn to_row(&self, table: &str, columns: &[String]) -> OrmResult<Row> {
        match (self, columns) {
            (Key::Scalar(value), [single]) => {
                let mut row = Row::new();
                row.insert(single.clone(), value.clone());
                Ok(row)
            }
            (Key::Composite(pairs), _)
                if pairs.len() == columns.len()
                    && pairs.iter().all(|(c, _)| columns.contains(c)) =>
            {
                Ok(pairs.iter().cloned().collect())
            }
            _ => Err(ModelError::MissingPrimaryKey(table.to_string())),
        }
    }

    pub(crate) fn to_condition(&self, table: &str, columns: &[String]) -> OrmResult<Condition> {
        Ok(Condition::from_row(&self.to_row(table, columns)?))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Scalar(value) => write!(f, "{}", value),
            Key::Composite(pairs) => {
                let pairs: Vec<String> = pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                write!(f, "{}", pairs.join(","))
            }
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::Scalar(value)
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Scalar(Value::Integer(id))
    }
}

impl From<i32> for Key {
    fn from(id: i32) -> Self {
        Key::Scalar(Value::Integer(id as i64))
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Key::Scalar(Value::from(id))
    }
}

impl From<String> for Key {
    fn from(id: String) -> Self {
        Key::Scalar(Value::String(id))
    }
}

impl From<Vec<(String, Value)>> for Key {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        Key::Composite(pairs)
    }
}
