//! Schema migrations
//!
//! - `context`: `MigrationContext`, the commands a migration can issue
//! - `runner`: the `Migration` trait and the `Migrator`

pub mod context;
pub mod runner;

pub use context::MigrationContext;
pub use runner::{Migration, Migrator};
