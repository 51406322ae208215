use async_trait::async_trait;

use crate::model::Record;
use crate::value::Row;

pub use crate::event_error::EventError;

/// Lifecycle hooks for records of one model definition.
///
/// Insert runs `creating -> saving -> [write] -> saved -> created`, update
/// runs `updating -> saving -> [write] -> saved -> updated` and delete runs
/// `deleting -> [write] -> deleted`. A before-hook returning a cancellation
/// (see [`EventError::is_cancellation`]) stops the operation without touching
/// storage.
#[async_trait]
pub trait RecordObserver: Send + Sync {
    async fn creating(&self, _record: &mut Record) -> Result<(), EventError> {
        Ok(())
    }

    async fn created(&self, _record: &Record) -> Result<(), EventError> {
        Ok(())
    }

    async fn updating(&self, _record: &mut Record) -> Result<(), EventError> {
        Ok(())
    }

    /// `changed` holds the previous values of the attributes that were written
    async fn updated(&self, _record: &Record, _changed: &Row) -> Result<(), EventError> {
        Ok(())
    }

    async fn saving(&self, _record: &mut Record) -> Result<(), EventError> {
        Ok(())
    }

    async fn saved(&self, _record: &Record) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleting(&self, _record: &Record) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleted(&self, _record: &Record) -> Result<(), EventError> {
        Ok(())
    }
}
