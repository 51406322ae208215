//! Storage boundary
//!
//! The record engine talks to storage through structured statements rather
//! than SQL text: a table name, a [`Row`] of column values, a [`Condition`]
//! and a [`Query`]. Backends:
//!
//! - [`MemoryStorage`]: in-process tables with snapshot transactions and a
//!   statement journal
//! - [`PostgresStorage`]: sqlx pool, statements rendered by [`sql`]

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::OrmResult;
use crate::schema::{ColumnSchema, TableSchema};
use crate::value::Row;

pub mod condition;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod sql;

pub use condition::{Condition, Operator};
pub use memory::{MemoryStorage, MemoryTransaction, Statement, StatementKind};
pub use postgres::{PostgresStorage, PostgresTransaction};
pub use query::{OrderDirection, Query};

/// Statement execution shared by the storage and its transactions
#[async_trait]
pub trait Executor: Send + Sync {
    /// Insert one row and return the values of the `returning` columns as
    /// stored (generated keys included)
    async fn insert(&self, table: &str, values: &Row, returning: &[String]) -> OrmResult<Row>;

    /// Update matching rows, returning the affected count
    async fn update(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64>;

    /// Add a signed delta to integer columns of matching rows
    async fn increment(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64>;

    /// Delete matching rows, returning the affected count
    async fn delete(&self, table: &str, condition: &Condition) -> OrmResult<u64>;

    async fn select(&self, query: &Query) -> OrmResult<Vec<Row>>;

    /// Number of rows matching the query filter; order and window are ignored
    async fn count(&self, query: &Query) -> OrmResult<u64>;

    async fn apply_ddl(&self, ddl: &Ddl) -> OrmResult<()>;
}

/// A storage connection that can open transactions and describe tables
#[async_trait]
pub trait Storage: Executor {
    async fn begin(&self) -> OrmResult<Box<dyn StorageTransaction>>;

    /// Column metadata for `table`, `None` when the table does not exist
    async fn load_table_schema(&self, table: &str) -> OrmResult<Option<TableSchema>>;
}

/// An open transaction; dropping it without commit rolls it back
#[async_trait]
pub trait StorageTransaction: Executor {
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Schema-changing statements
#[derive(Debug, Clone, PartialEq)]
pub enum Ddl {
    CreateTable(TableSchema),
    DropTable(String),
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: ColumnSchema,
    },
    DropColumn {
        table: String,
        column: String,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        name: String,
        table: String,
    },
}

impl Ddl {
    /// Short description used in migration output, e.g. `create table user_info`
    pub fn describe(&self) -> String {
        match self {
            Ddl::CreateTable(schema) => format!("create table {}", schema.name),
            Ddl::DropTable(table) => format!("drop table {}", table),
            Ddl::RenameTable { from, to } => format!("rename table {} to {}", from, to),
            Ddl::AddColumn { table, column } => {
                format!("add column {} to table {}", column.name, table)
            }
            Ddl::DropColumn { table, column } => {
                format!("drop column {} from table {}", column, table)
            }
            Ddl::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => format!(
                "create{} index {} on {} ({})",
                if *unique { " unique" } else { "" },
                name,
                table,
                columns.join(",")
            ),
            Ddl::DropIndex { name, .. } => format!("drop index {}", name),
        }
    }

    /// Tables whose structure the statement changes
    pub fn affected_tables(&self) -> Vec<&str> {
        match self {
            Ddl::CreateTable(schema) => vec![&schema.name],
            Ddl::DropTable(table) => vec![table],
            Ddl::RenameTable { from, to } => vec![from, to],
            Ddl::AddColumn { table, .. }
            | Ddl::DropColumn { table, .. }
            | Ddl::CreateIndex { table, .. }
            | Ddl::DropIndex { table, .. } => vec![table],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_ddl_describe() {
        let create = Ddl::CreateTable(TableSchema::new("user_info").column(ColumnSchema::primary_key("id")));
        assert_eq!(create.describe(), "create table user_info");

        let index = Ddl::CreateIndex {
            name: "idx_phone".to_string(),
            table: "user_info".to_string(),
            columns: vec!["phone".to_string()],
            unique: true,
        };
        assert_eq!(index.describe(), "create unique index idx_phone on user_info (phone)");

        let add = Ddl::AddColumn {
            table: "user_info".to_string(),
            column: ColumnSchema::new("image", ColumnType::String),
        };
        assert_eq!(add.describe(), "add column image to table user_info");
        assert_eq!(add.affected_tables(), vec!["user_info"]);
    }
}
