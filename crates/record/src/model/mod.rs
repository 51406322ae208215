//! Records and their static definitions
//!
//! - `definition`: table binding, scenarios, rules, locking, observers
//! - `primary_key`: `Key`
//! - `record`: `Record`, attribute and dirty tracking, validation
//! - `lifecycle`: observer dispatch used by the persister

pub mod definition;
pub(crate) mod lifecycle;
pub mod primary_key;
pub mod record;

pub use definition::{
    ModelDefinition, ModelDefinitionBuilder, Operations, ScenarioConfig, DEFAULT_SCENARIO,
};
pub use primary_key::Key;
pub use record::Record;
