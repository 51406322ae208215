//! Table and column metadata
//!
//! Column metadata is what the catalog hands out to records: the abstract
//! type, nullability, default and key flags, plus `typecast`, which turns a
//! raw storage value (often a string) into the native `Value` kind for the
//! column.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Abstract column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    SmallInteger,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal,
    Money,
    Char,
    String,
    Text,
    Boolean,
    Date,
    Time,
    DateTime,
    Timestamp,
    Binary,
}

impl ColumnType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInteger | ColumnType::Integer | ColumnType::BigInteger
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Double)
    }

    /// Types kept as text so that no precision is lost (decimal, money) or
    /// that have no dedicated `Value` kind (time)
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnType::Char
                | ColumnType::String
                | ColumnType::Text
                | ColumnType::Decimal
                | ColumnType::Money
                | ColumnType::Time
        )
    }
}

/// Metadata for one column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(skip)]
    pub default_value: Option<Value>,
    pub size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub is_primary_key: bool,
    pub auto_increment: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default_value: None,
            size: None,
            precision: None,
            scale: None,
            is_primary_key: false,
            auto_increment: false,
        }
    }

    /// Auto-incrementing integer primary key
    pub fn primary_key(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Integer);
        column.nullable = false;
        column.is_primary_key = true;
        column.auto_increment = true;
        column
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Mark the column as (part of) the primary key
    pub fn key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Convert a raw storage value into the native kind for this column.
    ///
    /// Strings are parsed for numeric, boolean and date columns; an empty
    /// string becomes null for every non-textual column. Values that cannot
    /// be parsed are returned unchanged.
    pub fn typecast(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        let ty = self.column_type;

        if let Value::String(s) = value {
            if s.is_empty() && !ty.is_textual() {
                return Value::Null;
            }
        }

        if ty.is_integer() {
            return match value {
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .unwrap_or_else(|_| value.clone()),
                Value::Bool(b) => Value::Integer(*b as i64),
                Value::Float(f) if f.fract() == 0.0 => Value::Integer(*f as i64),
                _ => value.clone(),
            };
        }

        if ty.is_float() {
            return match value {
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or_else(|_| value.clone()),
                Value::Integer(i) => Value::Float(*i as f64),
                _ => value.clone(),
            };
        }

        match ty {
            ColumnType::Boolean => match value {
                Value::Integer(i) => Value::Bool(*i != 0),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "1" | "t" | "true" | "y" | "yes" => Value::Bool(true),
                    "0" | "f" | "false" | "n" | "no" => Value::Bool(false),
                    _ => value.clone(),
                },
                _ => value.clone(),
            },
            ColumnType::Date => match value {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Value::Date)
                    .unwrap_or_else(|_| value.clone()),
                Value::DateTime(dt) => Value::Date(dt.date_naive()),
                _ => value.clone(),
            },
            ColumnType::DateTime | ColumnType::Timestamp => match value {
                Value::String(s) => parse_datetime(s.trim())
                    .map(Value::DateTime)
                    .unwrap_or_else(|| value.clone()),
                _ => value.clone(),
            },
            ColumnType::Binary => match value {
                Value::String(s) => Value::Binary(s.as_bytes().to_vec()),
                _ => value.clone(),
            },
            _ => match value {
                Value::Integer(i) => Value::String(i.to_string()),
                Value::Float(f) => Value::String(f.to_string()),
                _ => value.clone(),
            },
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Metadata for one table: ordered columns and the primary key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Append a column; key columns are appended to the primary key in order
    pub fn column(mut self, column: ColumnSchema) -> Self {
        if column.is_primary_key && !self.primary_key.contains(&column.name) {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub(crate) fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
        self.primary_key.retain(|c| c != name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_info() -> TableSchema {
        TableSchema::new("user_info")
            .column(ColumnSchema::primary_key("id"))
            .column(ColumnSchema::new("name", ColumnType::String).size(255).not_null())
            .column(ColumnSchema::new("type", ColumnType::Integer).not_null().default_value(2))
            .column(ColumnSchema::new("birthday", ColumnType::Date))
            .column(ColumnSchema::new("cost", ColumnType::Money).precision(19, 4))
    }

    #[test]
    fn test_primary_key_collected_in_order() {
        let table = TableSchema::new("order_item")
            .column(ColumnSchema::new("order_id", ColumnType::Integer).key())
            .column(ColumnSchema::new("item_id", ColumnType::Integer).key())
            .column(ColumnSchema::new("quantity", ColumnType::Integer));

        assert_eq!(table.primary_key, vec!["order_id", "item_id"]);
    }

    #[test]
    fn test_typecast_integer_column() {
        let table = user_info();
        let column = table.get_column("type").unwrap();
        assert_eq!(column.typecast(&Value::from("3")), Value::Integer(3));
        assert_eq!(column.typecast(&Value::from("")), Value::Null);
        assert_eq!(column.typecast(&Value::from("abc")), Value::from("abc"));
    }

    #[test]
    fn test_typecast_date_column() {
        let table = user_info();
        let column = table.get_column("birthday").unwrap();
        assert_eq!(
            column.typecast(&Value::from("1990-04-02")),
            Value::Date(NaiveDate::from_ymd_opt(1990, 4, 2).unwrap())
        );
    }

    #[test]
    fn test_typecast_keeps_money_textual() {
        let table = user_info();
        let column = table.get_column("cost").unwrap();
        assert_eq!(column.typecast(&Value::from("12.5000")), Value::from("12.5000"));
        assert_eq!(column.typecast(&Value::from("")), Value::from(""));
    }

    #[test]
    fn test_typecast_boolean_column() {
        let column = ColumnSchema::new("active", ColumnType::Boolean);
        assert_eq!(column.typecast(&Value::from("t")), Value::Bool(true));
        assert_eq!(column.typecast(&Value::Integer(0)), Value::Bool(false));
    }

    #[test]
    fn test_typecast_datetime_column() {
        let column = ColumnSchema::new("created_at", ColumnType::DateTime);
        let value = column.typecast(&Value::from("2017-03-30 09:08:43"));
        assert!(matches!(value, Value::DateTime(_)));
    }
}
