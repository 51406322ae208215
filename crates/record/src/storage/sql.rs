//! PostgreSQL rendering of structured statements
//!
//! Values are bound as `$n` parameters. Null values are written inline as
//! `NULL` so that no untyped parameter has to be bound; `"col" = NULL`
//! is never true, which matches the in-memory evaluation of a comparison
//! against null.

use std::collections::BTreeMap;

use super::{Condition, Ddl, Query};
use crate::schema::{ColumnSchema, ColumnType};
use crate::value::{Row, Value};

/// Rendered statement: SQL text plus positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Escape a SQL identifier (table name, column name, etc.)
///
/// Double quotes inside the identifier are doubled and the result is
/// wrapped in double quotes.
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[derive(Default)]
struct Params {
    values: Vec<Value>,
}

impl Params {
    /// Placeholder for `value`, or `NULL` for a null value
    fn push(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.values.push(value.clone());
        format!("${}", self.values.len())
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            params: self.values,
        }
    }
}

fn render_condition(condition: &Condition, params: &mut Params) -> String {
    match condition {
        Condition::All => "TRUE".to_string(),
        Condition::Compare {
            column,
            operator,
            value,
        } => format!(
            "{} {} {}",
            escape_identifier(column),
            operator,
            params.push(value)
        ),
        Condition::In { column, values } => {
            if values.is_empty() {
                return "FALSE".to_string();
            }
            let list: Vec<String> = values.iter().map(|v| params.push(v)).collect();
            format!("{} IN ({})", escape_identifier(column), list.join(", "))
        }
        Condition::IsNull(column) => format!("{} IS NULL", escape_identifier(column)),
        Condition::IsNotNull(column) => format!("{} IS NOT NULL", escape_identifier(column)),
        Condition::And(parts) => join_parts(parts, " AND ", "TRUE", params),
        Condition::Or(parts) => join_parts(parts, " OR ", "FALSE", params),
        Condition::Not(inner) => format!("NOT ({})", render_condition(inner, params)),
    }
}

fn join_parts(parts: &[Condition], separator: &str, empty: &str, params: &mut Params) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts
        .iter()
        .map(|p| format!("({})", render_condition(p, params)))
        .collect();
    rendered.join(separator)
}

fn where_clause(condition: &Condition, params: &mut Params) -> String {
    match condition {
        Condition::All => String::new(),
        other => format!(" WHERE {}", render_condition(other, params)),
    }
}

pub fn insert(table: &str, values: &Row, returning: &[String]) -> SqlStatement {
    let mut params = Params::default();
    let mut sql = format!("INSERT INTO {}", escape_identifier(table));

    if values.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let columns: Vec<String> = values.keys().map(|c| escape_identifier(c)).collect();
        let placeholders: Vec<String> = values.values().map(|v| params.push(v)).collect();
        sql.push_str(&format!(
            " ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ));
    }

    if !returning.is_empty() {
        let columns: Vec<String> = returning.iter().map(|c| escape_identifier(c)).collect();
        sql.push_str(&format!(" RETURNING {}", columns.join(", ")));
    }
    params.finish(sql)
}

pub fn update(table: &str, values: &Row, condition: &Condition) -> SqlStatement {
    let mut params = Params::default();
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| format!("{} = {}", escape_identifier(column), params.push(value)))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        escape_identifier(table),
        assignments.join(", ")
    );
    sql.push_str(&where_clause(condition, &mut params));
    params.finish(sql)
}

pub fn increment(table: &str, counters: &BTreeMap<String, i64>, condition: &Condition) -> SqlStatement {
    let mut params = Params::default();
    let assignments: Vec<String> = counters
        .iter()
        .map(|(column, delta)| {
            let column = escape_identifier(column);
            format!("{} = {} + {}", column, column, params.push(&Value::Integer(*delta)))
        })
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        escape_identifier(table),
        assignments.join(", ")
    );
    sql.push_str(&where_clause(condition, &mut params));
    params.finish(sql)
}

pub fn delete(table: &str, condition: &Condition) -> SqlStatement {
    let mut params = Params::default();
    let mut sql = format!("DELETE FROM {}", escape_identifier(table));
    sql.push_str(&where_clause(condition, &mut params));
    params.finish(sql)
}

pub fn select(query: &Query) -> SqlStatement {
    let mut params = Params::default();
    let mut sql = format!("SELECT * FROM {}", escape_identifier(&query.table));
    sql.push_str(&where_clause(&query.condition, &mut params));

    if !query.order_by.is_empty() {
        let orders: Vec<String> = query
            .order_by
            .iter()
            .map(|(column, direction)| format!("{} {}", escape_identifier(column), direction))
            .collect();
        sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", bigint(limit)));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" OFFSET {}", bigint(offset)));
    }
    params.finish(sql)
}

/// LIMIT and OFFSET are bigint in PostgreSQL
fn bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn count(query: &Query) -> SqlStatement {
    let mut params = Params::default();
    let mut sql = format!("SELECT COUNT(*) FROM {}", escape_identifier(&query.table));
    sql.push_str(&where_clause(&query.condition, &mut params));
    params.finish(sql)
}

/// Column type as written in DDL
pub fn column_type(column: &ColumnSchema) -> String {
    if column.auto_increment {
        return match column.column_type {
            ColumnType::BigInteger => "BIGSERIAL".to_string(),
            _ => "SERIAL".to_string(),
        };
    }
    match column.column_type {
        ColumnType::SmallInteger => "SMALLINT".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInteger => "BIGINT".to_string(),
        ColumnType::Float => "REAL".to_string(),
        ColumnType::Double => "DOUBLE PRECISION".to_string(),
        ColumnType::Decimal => match (column.precision, column.scale) {
            (Some(p), Some(s)) => format!("NUMERIC({},{})", p, s),
            (Some(p), None) => format!("NUMERIC({})", p),
            _ => "NUMERIC".to_string(),
        },
        ColumnType::Money => format!(
            "NUMERIC({},{})",
            column.precision.unwrap_or(19),
            column.scale.unwrap_or(4)
        ),
        ColumnType::Char => format!("CHAR({})", column.size.unwrap_or(1)),
        ColumnType::String => format!("VARCHAR({})", column.size.unwrap_or(255)),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Time => "TIME(0)".to_string(),
        ColumnType::DateTime | ColumnType::Timestamp => "TIMESTAMP(0)".to_string(),
        ColumnType::Binary => "BYTEA".to_string(),
    }
}

/// Literal for a DEFAULT clause
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Date(d) => format!("'{}'", d),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::Binary(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("'\\x{}'", hex)
        }
    }
}

fn column_definition(column: &ColumnSchema) -> String {
    let mut definition = format!("{} {}", escape_identifier(&column.name), column_type(column));
    if !column.nullable && !column.auto_increment {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        definition.push_str(&format!(" DEFAULT {}", literal(default)));
    }
    definition
}

pub fn ddl(ddl: &Ddl) -> String {
    match ddl {
        Ddl::CreateTable(schema) => {
            let mut parts: Vec<String> = schema.columns.iter().map(column_definition).collect();
            if !schema.primary_key.is_empty() {
                let keys: Vec<String> = schema.primary_key.iter().map(|c| escape_identifier(c)).collect();
                parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
            }
            format!(
                "CREATE TABLE {} (\n    {}\n)",
                escape_identifier(&schema.name),
                parts.join(",\n    ")
            )
        }
        Ddl::DropTable(table) => format!("DROP TABLE {}", escape_identifier(table)),
        Ddl::RenameTable { from, to } => format!(
            "ALTER TABLE {} RENAME TO {}",
            escape_identifier(from),
            escape_identifier(to)
        ),
        Ddl::AddColumn { table, column } => format!(
            "ALTER TABLE {} ADD COLUMN {}",
            escape_identifier(table),
            column_definition(column)
        ),
        Ddl::DropColumn { table, column } => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            escape_identifier(table),
            escape_identifier(column)
        ),
        Ddl::CreateIndex {
            name,
            table,
            columns,
            unique,
        } => {
            let columns: Vec<String> = columns.iter().map(|c| escape_identifier(c)).collect();
            format!(
                "CREATE {}INDEX {} ON {} ({})",
                if *unique { "UNIQUE " } else { "" },
                escape_identifier(name),
                escape_identifier(table),
                columns.join(", ")
            )
        }
        Ddl::DropIndex { name, .. } => format!("DROP INDEX {}", escape_identifier(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableSchema;
    use crate::storage::OrderDirection;
    use crate::value::row;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("user_info"), "\"user_info\"");
        assert_eq!(escape_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_insert_with_returning() {
        let stmt = insert(
            "user_info",
            &row([("name", Value::from("Ann")), ("image", Value::Null)]),
            &["id".to_string()],
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"user_info\" (\"image\", \"name\") VALUES (NULL, $1) RETURNING \"id\""
        );
        assert_eq!(stmt.params, vec![Value::from("Ann")]);
    }

    #[test]
    fn test_insert_without_values() {
        let stmt = insert("audit", &Row::new(), &[]);
        assert_eq!(stmt.sql, "INSERT INTO \"audit\" DEFAULT VALUES");
    }

    #[test]
    fn test_update_with_lock_condition() {
        let stmt = update(
            "user_info",
            &row([("name", Value::from("Bob")), ("version", Value::Integer(4))]),
            &Condition::eq("id", 7).and(Condition::eq("version", 3)),
        );
        assert_eq!(
            stmt.sql,
            "UPDATE \"user_info\" SET \"name\" = $1, \"version\" = $2 WHERE (\"id\" = $3) AND (\"version\" = $4)"
        );
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_increment() {
        let counters: BTreeMap<String, i64> = [("views".to_string(), 1)].into_iter().collect();
        let stmt = increment("post", &counters, &Condition::All);
        assert_eq!(stmt.sql, "UPDATE \"post\" SET \"views\" = \"views\" + $1");
    }

    #[test]
    fn test_select_and_count() {
        let query = Query::table("user_info")
            .filter(Condition::is_in("type", [1, 2]))
            .add_order_by("id", OrderDirection::Desc)
            .limit(2)
            .offset(4);
        let stmt = select(&query);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"user_info\" WHERE \"type\" IN ($1, $2) ORDER BY \"id\" DESC LIMIT 2 OFFSET 4"
        );

        let stmt = count(&query.without_paging());
        assert_eq!(stmt.sql, "SELECT COUNT(*) FROM \"user_info\" WHERE \"type\" IN ($1, $2)");
    }

    #[test]
    fn test_offset_clamped_to_bigint() {
        let query = Query::table("user_info").limit(20).offset(u64::MAX);
        assert_eq!(
            select(&query).sql,
            format!("SELECT * FROM \"user_info\" LIMIT 20 OFFSET {}", i64::MAX)
        );
    }

    #[test]
    fn test_empty_in_never_matches() {
        let stmt = delete("user_info", &Condition::is_in("id", Vec::<i64>::new()));
        assert_eq!(stmt.sql, "DELETE FROM \"user_info\" WHERE FALSE");
    }

    #[test]
    fn test_create_table_ddl() {
        let schema = TableSchema::new("user_info")
            .column(ColumnSchema::primary_key("id"))
            .column(ColumnSchema::new("name", ColumnType::String).size(255).not_null())
            .column(ColumnSchema::new("type", ColumnType::Integer).not_null().default_value(2))
            .column(ColumnSchema::new("cost", ColumnType::Money));

        assert_eq!(
            ddl(&Ddl::CreateTable(schema)),
            "CREATE TABLE \"user_info\" (\n    \"id\" SERIAL,\n    \"name\" VARCHAR(255) NOT NULL,\n    \"type\" INTEGER NOT NULL DEFAULT 2,\n    \"cost\" NUMERIC(19,4),\n    PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn test_literal_escapes_quotes() {
        assert_eq!(literal(&Value::from("it's")), "'it''s'");
        assert_eq!(literal(&Value::Bool(true)), "TRUE");
    }
}
