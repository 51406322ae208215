//! Observer dispatch around insert, update and delete
//!
//! Before-hooks answer whether the operation may proceed: a cancellation
//! from any observer declines it, any other observer error fails it.
//! After-hooks can only fail.

use std::sync::Arc;

use super::record::Record;
use crate::error::{ModelError, OrmResult};
use crate::events::EventError;
use crate::value::Row;

fn declined(record: &mut Record, hook: &str, error: EventError) -> OrmResult<bool> {
    if !error.is_cancellation() {
        return Err(ModelError::from(error));
    }
    if let EventError::Validation { attribute, message } = &error {
        record.add_error(attribute, message);
    }
    tracing::debug!("{} of '{}' declined by observer: {}", hook, record.table(), error);
    Ok(false)
}

/// creating -> saving
pub(crate) async fn before_insert(record: &mut Record) -> OrmResult<bool> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        if let Err(error) = observer.creating(record).await {
            return declined(record, "insert", error);
        }
    }
    for observer in definition.observers() {
        if let Err(error) = observer.saving(record).await {
            return declined(record, "insert", error);
        }
    }
    Ok(true)
}

/// saved -> created
pub(crate) async fn after_insert(record: &Record) -> OrmResult<()> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        observer.saved(record).await?;
    }
    for observer in definition.observers() {
        observer.created(record).await?;
    }
    Ok(())
}

/// updating -> saving
pub(crate) async fn before_update(record: &mut Record) -> OrmResult<bool> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        if let Err(error) = observer.updating(record).await {
            return declined(record, "update", error);
        }
    }
    for observer in definition.observers() {
        if let Err(error) = observer.saving(record).await {
            return declined(record, "update", error);
        }
    }
    Ok(true)
}

/// saved -> updated
pub(crate) async fn after_update(record: &Record, changed: &Row) -> OrmResult<()> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        observer.saved(record).await?;
    }
    for observer in definition.observers() {
        observer.updated(record, changed).await?;
    }
    Ok(())
}

pub(crate) async fn before_delete(record: &mut Record) -> OrmResult<bool> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        if let Err(error) = observer.deleting(record).await {
            return declined(record, "delete", error);
        }
    }
    Ok(true)
}

pub(crate) async fn after_delete(record: &Record) -> OrmResult<()> {
    let definition = Arc::clone(record.definition());
    for observer in definition.observers() {
        observer.deleted(record).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::events::RecordObserver;
    use crate::model::ModelDefinition;
    use crate::schema::{ColumnSchema, ColumnType, TableSchema};

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RecordObserver for Recorder {
        async fn creating(&self, _record: &mut Record) -> Result<(), EventError> {
            self.calls.lock().unwrap().push("creating");
            Ok(())
        }

        async fn saving(&self, record: &mut Record) -> Result<(), EventError> {
            self.calls.lock().unwrap().push("saving");
            if record.get_attribute("name").as_str() == Some("blocked") {
                return Err(EventError::validation("name", "Name is blacklisted"));
            }
            Ok(())
        }

        async fn saved(&self, _record: &Record) -> Result<(), EventError> {
            self.calls.lock().unwrap().push("saved");
            Ok(())
        }

        async fn created(&self, _record: &Record) -> Result<(), EventError> {
            self.calls.lock().unwrap().push("created");
            Ok(())
        }

        async fn deleting(&self, _record: &Record) -> Result<(), EventError> {
            Err(EventError::observer("audit log unavailable"))
        }
    }

    fn record_with(calls: Arc<Mutex<Vec<&'static str>>>) -> Record {
        let definition = ModelDefinition::new("user_info")
            .observer(Recorder { calls })
            .build();
        let schema = TableSchema::new("user_info")
            .column(ColumnSchema::primary_key("id"))
            .column(ColumnSchema::new("name", ColumnType::String));
        Record::new(definition, Arc::new(schema))
    }

    #[tokio::test]
    async fn test_insert_hook_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut record = record_with(Arc::clone(&calls));

        assert!(before_insert(&mut record).await.unwrap());
        after_insert(&record).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["creating", "saving", "saved", "created"]);
    }

    #[tokio::test]
    async fn test_validation_cancellation_declines_and_records_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut record = record_with(Arc::clone(&calls));
        record.set_attribute("name", "blocked").unwrap();

        assert!(!before_insert(&mut record).await.unwrap());
        assert_eq!(record.errors().first("name"), Some("Name is blacklisted"));
    }

    #[tokio::test]
    async fn test_observer_failure_propagates() {
        let mut record = record_with(Arc::new(Mutex::new(Vec::new())));
        let result = before_delete(&mut record).await;
        assert!(matches!(result, Err(ModelError::Event(_))));
    }
}
