//! # elif-record: record persistence and data providers for elif.rs
//!
//! ActiveRecord-style records with dirty-attribute tracking, scenario-based
//! validation and transactional insert/update/delete with optimistic
//! locking, plus paginated, sortable data providers over a record query or
//! an in-memory collection.
//!
//! Everything is reached through an explicit [`Connection`]: a storage
//! backend ([`MemoryStorage`] or [`PostgresStorage`]) together with its
//! schema catalog.

pub mod config;
pub mod connection;
pub mod data;
pub mod error;
pub mod event_error;
pub mod events;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod schema;
pub mod storage;
pub mod validation;
pub mod value;

// Re-export core traits and types
pub use config::{ConfigError, DatabaseConfig};
pub use connection::Connection;
pub use data::{
    ActiveDataProvider, ArrayDataProvider, AttributeAccess, DataProvider, KeySelector, Pagination,
    Sort, SortAttribute,
};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use events::{EventError, RecordObserver};
pub use migration::{Migration, MigrationContext, Migrator};
pub use model::{Key, ModelDefinition, Operations, Record, DEFAULT_SCENARIO};
pub use persistence::{ActiveQuery, Persister, Stage};
pub use schema::{ColumnSchema, ColumnType, SchemaCatalog, TableSchema};
pub use storage::{
    Condition, Ddl, Executor, MemoryStorage, OrderDirection, PostgresStorage, Query, Storage,
    StorageTransaction,
};
pub use validation::{ValidationError, ValidationErrors, ValidationRule};
pub use value::{row, Row, Value};
