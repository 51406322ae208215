//! Schema catalog with per-connection caching
//!
//! The catalog loads table metadata from the storage and caches it until
//! told otherwise. Anything that changes table structure (the migrator,
//! or a caller issuing DDL directly) must call [`SchemaCatalog::refresh`]
//! or [`SchemaCatalog::refresh_table`] before records are used again.

use std::sync::Arc;

use dashmap::DashMap;

use super::table::{ColumnSchema, TableSchema};
use crate::error::{ModelError, OrmResult};
use crate::storage::Storage;

pub struct SchemaCatalog {
    storage: Arc<dyn Storage>,
    cache: DashMap<String, Arc<TableSchema>>,
    cache_enabled: bool,
}

impl SchemaCatalog {
    pub fn new(storage: Arc<dyn Storage>, cache_enabled: bool) -> Self {
        Self {
            storage,
            cache: DashMap::new(),
            cache_enabled,
        }
    }

    /// Metadata for `table`, or `ModelError::Schema` when the table is unknown
    pub async fn table(&self, table: &str) -> OrmResult<Arc<TableSchema>> {
        if self.cache_enabled {
            if let Some(schema) = self.cache.get(table) {
                return Ok(Arc::clone(schema.value()));
            }
        }

        tracing::debug!("Loading schema for table '{}'", table);
        let schema = self
            .storage
            .load_table_schema(table)
            .await?
            .map(Arc::new)
            .ok_or_else(|| ModelError::Schema(format!("The table does not exist: {}", table)))?;

        if self.cache_enabled {
            self.cache.insert(table.to_string(), Arc::clone(&schema));
        }
        Ok(schema)
    }

    /// Ordered column metadata
    pub async fn columns(&self, table: &str) -> OrmResult<Vec<ColumnSchema>> {
        Ok(self.table(table).await?.columns.clone())
    }

    /// Ordered primary-key column names
    pub async fn primary_key(&self, table: &str) -> OrmResult<Vec<String>> {
        Ok(self.table(table).await?.primary_key.clone())
    }

    /// Drop every cached table
    pub fn refresh(&self) {
        tracing::debug!("Schema cache cleared ({} tables)", self.cache.len());
        self.cache.clear();
    }

    /// Drop one cached table
    pub fn refresh_table(&self, table: &str) {
        self.cache.remove(table);
    }

    pub fn is_cached(&self, table: &str) -> bool {
        self.cache.contains_key(table)
    }
}

impl std::fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("cached_tables", &self.cache.len())
            .field("cache_enabled", &self.cache_enabled)
            .finish()
    }
}
