//! Applies and reverts migrations, recording applied versions in a table

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use super::context::MigrationContext;
use crate::connection::Connection;
use crate::error::{ModelError, OrmResult};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};
use crate::storage::{Condition, Ddl, Query, StorageTransaction};
use crate::value::{row, Value};

/// One schema change, identified by a sortable version such as
/// `m170330_090843_create_user_info`
#[async_trait]
pub trait Migration: Send + Sync {
    fn version(&self) -> &str;

    async fn up(&self, ctx: &MigrationContext<'_>) -> OrmResult<()>;

    async fn down(&self, _ctx: &MigrationContext<'_>) -> OrmResult<()> {
        Err(ModelError::Migration(format!(
            "{} does not support migration down",
            self.version()
        )))
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Runs registered migrations in version order.
///
/// Every migration runs in its own transaction together with its history
/// row. The schema catalog is refreshed after each run.
pub struct Migrator {
    connection: Connection,
    migrations: Vec<Box<dyn Migration>>,
    table: String,
}

impl Migrator {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            migrations: Vec::new(),
            table: "migration".to_string(),
        }
    }

    /// History table name, `migration` by default
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn add<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.migrations.push(Box::new(migration));
        self.migrations.sort_by(|a, b| a.version().cmp(b.version()));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_history_table(&self) -> OrmResult<()> {
        let storage = self.connection.storage();
        if storage.load_table_schema(&self.table).await?.is_some() {
            return Ok(());
        }
        tracing::info!("Creating migration history table \"{}\"", self.table);
        storage
            .apply_ddl(&Ddl::CreateTable(
                TableSchema::new(&self.table)
                    .column(ColumnSchema::new("version", ColumnType::String).size(180).key())
                    .column(ColumnSchema::new("apply_time", ColumnType::Integer)),
            ))
            .await
    }

    /// Applied versions, oldest first
    pub async fn applied(&self) -> OrmResult<Vec<String>> {
        self.ensure_history_table().await?;
        let rows = self
            .connection
            .storage()
            .select(&Query::table(&self.table).order_by("version"))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get("version").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// Registered versions not applied yet, in order
    pub async fn pending(&self) -> OrmResult<Vec<String>> {
        let applied = self.applied().await?;
        Ok(self
            .migrations
            .iter()
            .map(|m| m.version().to_string())
            .filter(|v| !applied.contains(v))
            .collect())
    }

    /// Apply up to `limit` pending migrations (all when `None`)
    pub async fn up(&self, limit: Option<usize>) -> OrmResult<Vec<String>> {
        let pending = self.pending().await?;
        let count = limit.unwrap_or(pending.len()).min(pending.len());
        let mut applied = Vec::new();

        for version in pending.into_iter().take(count) {
            let migration = self.migration(&version)?;
            let started = Instant::now();
            tracing::info!("*** applying {}", version);

            let result = self.run(migration, Direction::Up).await;
            self.connection.schema().refresh();
            if let Err(err) = result {
                tracing::warn!("*** failed to apply {}", version);
                return Err(ModelError::Migration(format!(
                    "Failed to apply {}: {}",
                    version, err
                )));
            }

            tracing::info!(
                "*** applied {} (time: {:.3}s)",
                version,
                started.elapsed().as_secs_f64()
            );
            applied.push(version);
        }
        Ok(applied)
    }

    /// Revert the last `limit` applied migrations, newest first
    pub async fn down(&self, limit: usize) -> OrmResult<Vec<String>> {
        let mut applied = self.applied().await?;
        applied.reverse();
        let mut reverted = Vec::new();

        for version in applied.into_iter().take(limit) {
            let migration = self.migration(&version)?;
            let started = Instant::now();
            tracing::info!("*** reverting {}", version);

            let result = self.run(migration, Direction::Down).await;
            self.connection.schema().refresh();
            if let Err(err) = result {
                tracing::warn!("*** failed to revert {}", version);
                return Err(ModelError::Migration(format!(
                    "Failed to revert {}: {}",
                    version, err
                )));
            }

            tracing::info!(
                "*** reverted {} (time: {:.3}s)",
                version,
                started.elapsed().as_secs_f64()
            );
            reverted.push(version);
        }
        Ok(reverted)
    }

    fn migration(&self, version: &str) -> OrmResult<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.version() == version)
            .map(|m| m.as_ref())
            .ok_or_else(|| ModelError::Migration(format!("Unknown migration version: {}", version)))
    }

    /// Run one direction of a migration and its history change in a transaction
    async fn run(&self, migration: &dyn Migration, direction: Direction) -> OrmResult<()> {
        let transaction = self.connection.storage().begin().await?;
        let outcome = self.run_steps(&*transaction, migration, direction).await;

        match outcome {
            Ok(()) => transaction.commit().await,
            Err(err) => {
                if let Err(rollback) = transaction.rollback().await {
                    tracing::warn!("Rollback failed: {}", rollback);
                }
                Err(err)
            }
        }
    }

    async fn run_steps(
        &self,
        transaction: &dyn StorageTransaction,
        migration: &dyn Migration,
        direction: Direction,
    ) -> OrmResult<()> {
        let ctx = MigrationContext::new(transaction);
        match direction {
            Direction::Up => {
                migration.up(&ctx).await?;
                let history = row([
                    ("version", Value::from(migration.version())),
                    ("apply_time", Value::Integer(Utc::now().timestamp())),
                ]);
                transaction.insert(&self.table, &history, &[]).await?;
            }
            Direction::Down => {
                migration.down(&ctx).await?;
                transaction
                    .delete(&self.table, &Condition::eq("version", migration.version()))
                    .await?;
            }
        }
        Ok(())
    }
}
