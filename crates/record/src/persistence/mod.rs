//! Persistence engine
//!
//! - `persister`: `Persister`, single-record writes, bulk writes, lookups
//! - `query`: `ActiveQuery`
//! - `stage`: `Stage` of a write operation

pub mod persister;
pub mod query;
pub mod stage;

pub use persister::Persister;
pub use query::ActiveQuery;
pub use stage::Stage;
