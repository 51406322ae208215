//! Connection handle shared by persisters, providers and migrators

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::{ModelError, OrmResult};
use crate::model::{ModelDefinition, Record};
use crate::schema::{SchemaCatalog, TableSchema};
use crate::storage::{PostgresStorage, Storage};

/// A storage together with its schema catalog.
///
/// Clones share both; there is no process-wide default connection.
#[derive(Clone)]
pub struct Connection {
    storage: Arc<dyn Storage>,
    schema: Arc<SchemaCatalog>,
}

impl Connection {
    /// Wrap a storage with schema caching enabled
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_schema_cache(storage, true)
    }

    pub fn with_schema_cache(storage: Arc<dyn Storage>, cache_enabled: bool) -> Self {
        let schema = Arc::new(SchemaCatalog::new(Arc::clone(&storage), cache_enabled));
        Self { storage, schema }
    }

    /// Open a PostgreSQL pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let storage = PostgresStorage::connect(config).await?;
        tracing::debug!("Schema cache enabled: {}", config.schema_cache);
        Ok(Self::with_schema_cache(Arc::new(storage), config.schema_cache))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn schema(&self) -> &SchemaCatalog {
        &self.schema
    }

    pub async fn table_schema(&self, table: &str) -> OrmResult<Arc<TableSchema>> {
        self.schema.table(table).await
    }

    /// A new, empty record of the given model
    pub async fn instantiate(&self, definition: &Arc<ModelDefinition>) -> OrmResult<Record> {
        let schema = self.table_schema(definition.table()).await?;
        if let Some(lock) = definition.lock_column() {
            if !schema.has_column(lock) {
                return Err(ModelError::Configuration(format!(
                    "Optimistic lock column '{}' is not a column of table '{}'",
                    lock,
                    definition.table()
                )));
            }
        }
        Ok(Record::new(Arc::clone(definition), schema))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
