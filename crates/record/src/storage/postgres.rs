//! PostgreSQL storage backend
//!
//! Statements are rendered by [`super::sql`] and executed through a sqlx
//! pool. Table metadata comes from `information_schema`; a column whose
//! default is a `nextval(...)` call is reported as auto-incrementing.
//!
//! NUMERIC columns cannot be decoded without an arbitrary-precision decimal
//! type; reading one is a storage error. Decimal and money columns work with
//! the in-memory backend, which keeps them as text.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, PgConnection, PgPool, Postgres, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;

use super::sql::{self, SqlStatement};
use super::{Condition, Ddl, Executor, Query, Storage, StorageTransaction};
use crate::config::DatabaseConfig;
use crate::error::{ModelError, OrmResult};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};
use crate::value::{Row, Value};

/// Storage over a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        config
            .validate()
            .map_err(|e| ModelError::Configuration(e.to_string()))?;

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        if let Some(idle_timeout) = config.idle_timeout_secs {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }
        if let Some(max_lifetime) = config.max_lifetime_secs {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect(&config.url)
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!(
            "PostgreSQL pool ready (max_connections={})",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn acquire(&self) -> OrmResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to acquire connection: {}", e)))
    }
}

#[async_trait]
impl Executor for PostgresStorage {
    async fn insert(&self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row> {
        let mut conn = self.acquire().await?;
        run_insert(&mut conn, sql::insert(table, values, returning)).await
    }

    async fn update(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        let mut conn = self.acquire().await?;
        run_execute(&mut conn, sql::update(table, values, condition)).await
    }

    async fn increment(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        let mut conn = self.acquire().await?;
        run_execute(&mut conn, sql::increment(table, counters, condition)).await
    }

    async fn delete(&self, table: &str, condition: &Condition) -> OrmResult<u64> {
        let mut conn = self.acquire().await?;
        run_execute(&mut conn, sql::delete(table, condition)).await
    }

    async fn select(&self, query: &Query) -> OrmResult<Vec<Row>> {
        let mut conn = self.acquire().await?;
        run_select(&mut conn, sql::select(query)).await
    }

    async fn count(&self, query: &Query) -> OrmResult<u64> {
        let mut conn = self.acquire().await?;
        run_count(&mut conn, sql::count(query)).await
    }

    async fn apply_ddl(&self, ddl: &Ddl) -> OrmResult<()> {
        let mut conn = self.acquire().await?;
        run_ddl(&mut conn, ddl).await
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn begin(&self) -> OrmResult<Box<dyn StorageTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        tracing::debug!("Transaction started");
        Ok(Box::new(PostgresTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }

    async fn load_table_schema(&self, table: &str) -> OrmResult<Option<TableSchema>> {
        let mut conn = self.acquire().await?;
        load_schema(&mut conn, table).await
    }
}

/// Open transaction; sqlx rolls it back when dropped unfinished
pub struct PostgresTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

fn completed() -> ModelError {
    ModelError::Transaction("Transaction already completed".to_string())
}

#[async_trait]
impl Executor for PostgresTransaction {
    async fn insert(&self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_insert(&mut **tx, sql::insert(table, values, returning)).await
    }

    async fn update(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_execute(&mut **tx, sql::update(table, values, condition)).await
    }

    async fn increment(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_execute(&mut **tx, sql::increment(table, counters, condition)).await
    }

    async fn delete(&self, table: &str, condition: &Condition) -> OrmResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_execute(&mut **tx, sql::delete(table, condition)).await
    }

    async fn select(&self, query: &Query) -> OrmResult<Vec<Row>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_select(&mut **tx, sql::select(query)).await
    }

    async fn count(&self, query: &Query) -> OrmResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_count(&mut **tx, sql::count(query)).await
    }

    async fn apply_ddl(&self, ddl: &Ddl) -> OrmResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        run_ddl(&mut **tx, ddl).await
    }
}

#[async_trait]
impl StorageTransaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> OrmResult<()> {
        let tx = self.tx.into_inner().ok_or_else(completed)?;
        tx.commit()
            .await
            .map_err(|e| ModelError::Transaction(format!("Transaction commit failed: {}", e)))?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        let tx = self.tx.into_inner().ok_or_else(completed)?;
        tx.rollback()
            .await
            .map_err(|e| ModelError::Transaction(format!("Transaction rollback failed: {}", e)))?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

/// Bind a Value to a sqlx query
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Date(d) => query.bind(*d),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Binary(b) => query.bind(b.clone()),
    }
}

fn prepare(stmt: &SqlStatement) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    tracing::debug!("Executing SQL: {}", stmt.sql);
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), bind_value)
}

async fn run_execute(conn: &mut PgConnection, stmt: SqlStatement) -> OrmResult<u64> {
    let result = prepare(&stmt)
        .execute(&mut *conn)
        .await
        .map_err(|e| ModelError::Storage(format!("Query execution failed: {}", e)))?;
    Ok(result.rows_affected())
}

async fn run_insert(conn: &mut PgConnection, stmt: SqlStatement) -> OrmResult<Row> {
    let row = prepare(&stmt)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| ModelError::Storage(format!("Insert failed: {}", e)))?;
    match row {
        Some(row) => decode_row(&row),
        None => Ok(Row::new()),
    }
}

async fn run_select(conn: &mut PgConnection, stmt: SqlStatement) -> OrmResult<Vec<Row>> {
    let rows = prepare(&stmt)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ModelError::Storage(format!("Query fetch failed: {}", e)))?;
    rows.iter().map(decode_row).collect()
}

async fn run_count(conn: &mut PgConnection, stmt: SqlStatement) -> OrmResult<u64> {
    let row = prepare(&stmt)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| ModelError::Storage(format!("Count failed: {}", e)))?;
    let count: i64 = row
        .try_get(0)
        .map_err(|e| ModelError::Storage(format!("Failed to get count value: {}", e)))?;
    Ok(count.max(0) as u64)
}

async fn run_ddl(conn: &mut PgConnection, ddl: &Ddl) -> OrmResult<()> {
    let statement = sql::ddl(ddl);
    tracing::debug!("Executing DDL: {}", statement);
    sqlx::query(&statement)
        .execute(&mut *conn)
        .await
        .map_err(|e| ModelError::Storage(format!("DDL failed: {}", e)))?;
    Ok(())
}

fn decode_row(row: &PgRow) -> OrmResult<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(out)
}

/// Convert a PostgreSQL column value to a Value
fn decode_value(row: &PgRow, index: usize) -> OrmResult<Value> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    fn get<'r, T>(row: &'r PgRow, index: usize, type_name: &str) -> OrmResult<Option<T>>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(index).map_err(|e| {
            ModelError::Storage(format!("Failed to get {} value: {}", type_name, e))
        })
    }

    let value = match type_name {
        "BOOL" => get::<bool>(row, index, type_name)?.map(Value::Bool),
        "INT2" => get::<i16>(row, index, type_name)?.map(|v| Value::Integer(v as i64)),
        "INT4" => get::<i32>(row, index, type_name)?.map(|v| Value::Integer(v as i64)),
        "INT8" => get::<i64>(row, index, type_name)?.map(Value::Integer),
        "FLOAT4" => get::<f32>(row, index, type_name)?.map(|v| Value::Float(v as f64)),
        "FLOAT8" => get::<f64>(row, index, type_name)?.map(Value::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            get::<String>(row, index, type_name)?.map(Value::String)
        }
        "BYTEA" => get::<Vec<u8>>(row, index, type_name)?.map(Value::Binary),
        "TIMESTAMPTZ" => {
            get::<chrono::DateTime<chrono::Utc>>(row, index, type_name)?.map(Value::DateTime)
        }
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, index, type_name)?
            .map(|v| Value::DateTime(v.and_utc())),
        "DATE" => get::<chrono::NaiveDate>(row, index, type_name)?.map(Value::Date),
        "TIME" => get::<chrono::NaiveTime>(row, index, type_name)?
            .map(|v| Value::String(v.format("%H:%M:%S").to_string())),
        "JSON" | "JSONB" => get::<serde_json::Value>(row, index, type_name)?
            .map(|v| Value::String(v.to_string())),
        "NUMERIC" | "MONEY" => {
            return Err(ModelError::Storage(format!(
                "Column '{}' has type {}, which cannot be decoded; cast it to TEXT or DOUBLE PRECISION",
                column.name(),
                type_name
            )))
        }
        _ => get::<String>(row, index, type_name)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

const COLUMNS_SQL: &str = "SELECT c.column_name::text AS name, c.udt_name::text AS udt_name, \
     c.is_nullable::text AS is_nullable, c.column_default::text AS column_default, \
     c.character_maximum_length::int4 AS size, c.numeric_precision::int4 AS precision, \
     c.numeric_scale::int4 AS scale \
     FROM information_schema.columns c \
     WHERE c.table_schema = current_schema() AND c.table_name = $1 \
     ORDER BY c.ordinal_position";

const PRIMARY_KEY_SQL: &str = "SELECT kcu.column_name::text AS name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = current_schema() \
       AND tc.table_name = $1 \
     ORDER BY kcu.ordinal_position";

async fn load_schema(conn: &mut PgConnection, table: &str) -> OrmResult<Option<TableSchema>> {
    tracing::debug!("Loading schema for table '{}' from information_schema", table);

    let rows = sqlx::query(COLUMNS_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ModelError::Schema(format!("Failed to load columns of '{}': {}", table, e)))?;
    if rows.is_empty() {
        return Ok(None);
    }

    let keys: Vec<String> = sqlx::query(PRIMARY_KEY_SQL)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ModelError::Schema(format!("Failed to load primary key of '{}': {}", table, e)))?
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()?;

    let mut schema = TableSchema::new(table);
    for row in &rows {
        let name: String = row.try_get("name")?;
        let udt_name: String = row.try_get("udt_name")?;
        let is_nullable: String = row.try_get("is_nullable")?;
        let column_default: Option<String> = row.try_get("column_default")?;
        let size: Option<i32> = row.try_get("size")?;
        let precision: Option<i32> = row.try_get("precision")?;
        let scale: Option<i32> = row.try_get("scale")?;

        let mut column = ColumnSchema::new(name.clone(), column_type_from_udt(&udt_name));
        column.nullable = is_nullable == "YES";
        column.size = size.map(|s| s as u32);
        column.precision = precision.map(|p| p as u32);
        column.scale = scale.map(|s| s as u32);
        column.is_primary_key = keys.contains(&name);

        match column_default.as_deref() {
            Some(raw) if raw.starts_with("nextval(") => column.auto_increment = true,
            Some(raw) => {
                column.default_value = parse_default(raw)
                    .map(|text| column.typecast(&Value::String(text)))
                    .filter(|v| !v.is_null());
            }
            None => {}
        }
        schema.columns.push(column);
    }
    schema.primary_key = keys;
    Ok(Some(schema))
}

fn column_type_from_udt(udt_name: &str) -> ColumnType {
    match udt_name {
        "int2" => ColumnType::SmallInteger,
        "int4" => ColumnType::Integer,
        "int8" => ColumnType::BigInteger,
        "float4" => ColumnType::Float,
        "float8" => ColumnType::Double,
        "numeric" => ColumnType::Decimal,
        "money" => ColumnType::Money,
        "bpchar" | "char" => ColumnType::Char,
        "varchar" => ColumnType::String,
        "text" => ColumnType::Text,
        "bool" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "time" | "timetz" => ColumnType::Time,
        "timestamp" => ColumnType::DateTime,
        "timestamptz" => ColumnType::Timestamp,
        "bytea" => ColumnType::Binary,
        _ => ColumnType::String,
    }
}

/// Literal text of a column default; `None` for NULL and expressions
fn parse_default(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.to_ascii_uppercase().starts_with("NULL") {
        return None;
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest.rfind('\'')?;
        return Some(rest[..end].replace("''", "'"));
    }
    let literal = raw
        .split("::")
        .next()
        .unwrap_or(raw)
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    if literal.contains('(') {
        None
    } else {
        Some(literal.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default() {
        assert_eq!(parse_default("2"), Some("2".to_string()));
        assert_eq!(parse_default("'abc'::character varying"), Some("abc".to_string()));
        assert_eq!(parse_default("'it''s'::text"), Some("it's".to_string()));
        assert_eq!(parse_default("(-1)::integer"), Some("-1".to_string()));
        assert_eq!(parse_default("NULL::character varying"), None);
        assert_eq!(parse_default("now()"), None);
    }

    #[test]
    fn test_column_type_from_udt() {
        assert_eq!(column_type_from_udt("int4"), ColumnType::Integer);
        assert_eq!(column_type_from_udt("varchar"), ColumnType::String);
        assert_eq!(column_type_from_udt("timestamptz"), ColumnType::Timestamp);
        assert_eq!(column_type_from_udt("citext"), ColumnType::String);
    }
}
