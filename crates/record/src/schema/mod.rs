//! Schema catalog: column metadata per table
//!
//! - `table`: `TableSchema`, `ColumnSchema`, `ColumnType` and typecasting
//! - `catalog`: cached, invalidatable lookup over a `Storage`

pub mod catalog;
pub mod table;

pub use catalog::SchemaCatalog;
pub use table::{ColumnSchema, ColumnType, TableSchema};
