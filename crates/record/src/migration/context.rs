//! Commands available to a running migration

use std::time::Instant;

use crate::error::OrmResult;
use crate::schema::{ColumnSchema, TableSchema};
use crate::storage::{Condition, Ddl, StorageTransaction};
use crate::value::Row;

/// Executes migration commands inside the migration's transaction and
/// logs each one with its duration
pub struct MigrationContext<'a> {
    transaction: &'a dyn StorageTransaction,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(transaction: &'a dyn StorageTransaction) -> Self {
        Self { transaction }
    }

    pub async fn execute(&self, ddl: Ddl) -> OrmResult<()> {
        let started = Instant::now();
        tracing::info!("    > {} ...", ddl.describe());
        self.transaction.apply_ddl(&ddl).await?;
        tracing::info!(
            "    > {} ... done (time: {:.3}s)",
            ddl.describe(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    pub async fn create_table(&self, schema: TableSchema) -> OrmResult<()> {
        self.execute(Ddl::CreateTable(schema)).await
    }

    pub async fn drop_table(&self, table: &str) -> OrmResult<()> {
        self.execute(Ddl::DropTable(table.to_string())).await
    }

    pub async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()> {
        self.execute(Ddl::RenameTable {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await
    }

    pub async fn add_column(&self, table: &str, column: ColumnSchema) -> OrmResult<()> {
        self.execute(Ddl::AddColumn {
            table: table.to_string(),
            column,
        })
        .await
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()> {
        self.execute(Ddl::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
        .await
    }

    pub async fn create_index(
        &self,
        name: &str,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> OrmResult<()> {
        self.execute(Ddl::CreateIndex {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        })
        .await
    }

    pub async fn drop_index(&self, name: &str, table: &str) -> OrmResult<()> {
        self.execute(Ddl::DropIndex {
            name: name.to_string(),
            table: table.to_string(),
        })
        .await
    }

    /// Seed a row
    pub async fn insert(&self, table: &str, values: Row) -> OrmResult<()> {
        let started = Instant::now();
        self.transaction.insert(table, &values, &[]).await?;
        tracing::info!(
            "    > insert into {} ... done (time: {:.3}s)",
            table,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    pub async fn delete(&self, table: &str, condition: Condition) -> OrmResult<u64> {
        let started = Instant::now();
        let rows = self.transaction.delete(table, &condition).await?;
        tracing::info!(
            "    > delete from {} ... done (time: {:.3}s)",
            table,
            started.elapsed().as_secs_f64()
        );
        Ok(rows)
    }
}
