//! Error types for the record engine
//!
//! Validation failures are not errors: `Record::validate` reports them as
//! per-attribute messages and the save methods answer `false`/`None`.
//! Everything in this module is a condition the caller has to handle.

use thiserror::Error;

use crate::events::EventError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for record, persistence and data-provider operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Storage driver or transport failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Table is not known to the schema catalog
    #[error("Schema error: {0}")]
    Schema(String),

    /// Attribute is not a column of the bound table
    #[error("Unknown attribute '{attribute}' for table '{table}'")]
    UnknownAttribute { table: String, attribute: String },

    /// Optimistic-lock conflict: the row changed or vanished since it was loaded
    #[error("The object being {operation} is outdated: {table}({key})")]
    StaleObject {
        table: String,
        key: String,
        operation: &'static str,
    },

    /// Record was deleted and can no longer be read from or written to storage
    #[error("Record of table '{0}' has been deleted and is inert")]
    InertRecord(String),

    /// Primary key is missing or invalid
    #[error("Primary key is missing or invalid for table '{0}'")]
    MissingPrimaryKey(String),

    /// Invalid sort, pagination, scenario or connection configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transaction could not be started or finished
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A lifecycle hook failed with something other than a cancellation
    #[error("Event error: {0}")]
    Event(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Connection pool error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ModelError {
    /// Whether this error reports an optimistic-lock conflict
    pub fn is_stale_object(&self) -> bool {
        matches!(self, ModelError::StaleObject { .. })
    }

    pub(crate) fn unknown_attribute(table: &str, attribute: &str) -> Self {
        ModelError::UnknownAttribute {
            table: table.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Storage(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<EventError> for ModelError {
    fn from(err: EventError) -> Self {
        ModelError::Event(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_object_message() {
        let err = ModelError::StaleObject {
            table: "user_info".to_string(),
            key: "7".to_string(),
            operation: "updated",
        };

        assert!(err.is_stale_object());
        assert_eq!(
            err.to_string(),
            "The object being updated is outdated: user_info(7)"
        );
    }

    #[test]
    fn test_unknown_attribute_message() {
        let err = ModelError::unknown_attribute("user_info", "nickname");
        assert!(!err.is_stale_object());
        assert_eq!(
            err.to_string(),
            "Unknown attribute 'nickname' for table 'user_info'"
        );
    }

    #[test]
    fn test_event_error_conversion() {
        let err: ModelError = EventError::observer("mailer offline").into();
        match err {
            ModelError::Event(msg) => assert!(msg.contains("mailer offline")),
            _ => panic!("Expected event error"),
        }
    }
}
