//! Insert, update, delete and lookup of records
//!
//! Single-record writes validate, run the observer hooks and write through
//! the storage, inside a transaction when the record's scenario declares
//! the operation transactional. The transaction is committed when the
//! operation succeeds, rolled back (answering `false`/`None`) when it is
//! declined, and rolled back with the error propagated when it fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::query::ActiveQuery;
use super::stage::{OperationTrace, Stage};
use crate::connection::Connection;
use crate::error::{ModelError, OrmResult};
use crate::model::record::RecordState;
use crate::model::{lifecycle, Key, ModelDefinition, Operations, Record};
use crate::storage::{Condition, Executor, StorageTransaction};
use crate::value::{Row, Value};

/// Results that can say "declined" without being an error
pub(crate) trait Declinable {
    fn is_declined(&self) -> bool;
}

impl Declinable for bool {
    fn is_declined(&self) -> bool {
        !*self
    }
}

impl Declinable for Option<u64> {
    fn is_declined(&self) -> bool {
        self.is_none()
    }
}

/// Commit, roll back or roll back and propagate, per the operation's result
async fn finish_transaction<T: Declinable>(
    transaction: Box<dyn StorageTransaction>,
    result: OrmResult<T>,
    record: &mut Record,
    snapshot: RecordState,
) -> OrmResult<T> {
    match result {
        Ok(value) if !value.is_declined() => match transaction.commit().await {
            Ok(()) => {
                tracing::debug!("Transaction committed for '{}'", record.table());
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Commit failed for '{}': {}", record.table(), err);
                record.restore(snapshot);
                Err(err)
            }
        },
        Ok(value) => {
            tracing::debug!("Transaction rolled back for '{}': operation declined", record.table());
            transaction.rollback().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("Rolling back transaction for '{}': {}", record.table(), err);
            record.restore(snapshot);
            if let Err(rollback) = transaction.rollback().await {
                tracing::warn!("Rollback failed for '{}': {}", record.table(), rollback);
            }
            Err(err)
        }
    }
}

/// Persistence engine over one connection
#[derive(Debug, Clone)]
pub struct Persister {
    connection: Connection,
}

impl Persister {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Insert a new record.
    ///
    /// Answers `false` when validation fails or an observer declines; no
    /// storage statement is issued for a validation failure. Only the
    /// assigned attributes (optionally restricted to `attribute_names`) are
    /// written, so storage defaults apply to the rest. Generated key values
    /// and the lock version are read back into the record.
    pub async fn insert(
        &self,
        record: &mut Record,
        run_validation: bool,
        attribute_names: Option<&[&str]>,
    ) -> OrmResult<bool> {
        record.ensure_not_deleted()?;
        if !record.is_new_record() {
            return Err(ModelError::Configuration(format!(
                "The record of table '{}' cannot be inserted because it is not new",
                record.table()
            )));
        }

        let mut trace = OperationTrace::new("insert", record.table());
        if run_validation && !record.validate(attribute_names).await {
            tracing::info!("Model not inserted due to validation error.");
            trace.fail("validation");
            return Ok(false);
        }

        let transactional = record
            .definition()
            .is_transactional(record.scenario(), Operations::INSERT);
        if !transactional {
            let storage = Arc::clone(self.connection.storage());
            return self.insert_internal(&*storage, record, attribute_names, &mut trace).await;
        }

        let snapshot = record.snapshot();
        let transaction = self.connection.storage().begin().await?;
        let result = self
            .insert_internal(&*transaction, record, attribute_names, &mut trace)
            .await;
        finish_transaction(transaction, result, record, snapshot).await
    }

    async fn insert_internal<E: Executor + ?Sized>(
        &self,
        executor: &E,
        record: &mut Record,
        attribute_names: Option<&[&str]>,
        trace: &mut OperationTrace,
    ) -> OrmResult<bool> {
        trace.advance(Stage::BeforeHook);
        let proceed = lifecycle::before_insert(record).await.map_err(|e| {
            trace.fail("before-hook error");
            e
        })?;
        if !proceed {
            trace.fail("declined by observer");
            return Ok(false);
        }

        trace.advance(Stage::Executing);
        let mut values = record.dirty_attributes(attribute_names);
        let returning = returning_columns(record);
        let stored = match executor.insert(record.table(), &values, &returning).await {
            Ok(stored) => stored,
            Err(err) => {
                trace.fail("storage error");
                return Err(err);
            }
        };

        for (name, raw) in stored {
            let value = match record.schema().get_column(&name) {
                Some(column) => column.typecast(&raw),
                None => raw,
            };
            record.set_raw(&name, value.clone());
            values.insert(name, value);
        }
        record.set_old_attributes(Some(values));
        tracing::debug!("Inserted into '{}' with key {}", record.table(), record.primary_key());

        trace.advance(Stage::AfterHook);
        if let Err(err) = lifecycle::after_insert(record).await {
            trace.fail("after-hook error");
            return Err(err);
        }
        trace.done();
        Ok(true)
    }

    /// Write the dirty attributes of an existing record.
    ///
    /// Answers `None` when validation fails or an observer declines and the
    /// number of affected rows otherwise. Without dirty attributes nothing
    /// is written and the answer is `Some(0)`. With an optimistic-lock
    /// column, zero affected rows is a `StaleObject` error.
    pub async fn update(
        &self,
        record: &mut Record,
        run_validation: bool,
        attribute_names: Option<&[&str]>,
    ) -> OrmResult<Option<u64>> {
        record.ensure_not_deleted()?;
        if record.is_new_record() {
            return Err(ModelError::Configuration(format!(
                "The record of table '{}' cannot be updated because it is new",
                record.table()
            )));
        }

        let mut trace = OperationTrace::new("update", record.table());
        if run_validation && !record.validate(attribute_names).await {
            tracing::info!("Model not updated due to validation error.");
            trace.fail("validation");
            return Ok(None);
        }

        let transactional = record
            .definition()
            .is_transactional(record.scenario(), Operations::UPDATE);
        if !transactional {
            let storage = Arc::clone(self.connection.storage());
            return self.update_internal(&*storage, record, attribute_names, &mut trace).await;
        }

        let snapshot = record.snapshot();
        let transaction = self.connection.storage().begin().await?;
        let result = self
            .update_internal(&*transaction, record, attribute_names, &mut trace)
            .await;
        finish_transaction(transaction, result, record, snapshot).await
    }

    async fn update_internal<E: Executor + ?Sized>(
        &self,
        executor: &E,
        record: &mut Record,
        attribute_names: Option<&[&str]>,
        trace: &mut OperationTrace,
    ) -> OrmResult<Option<u64>> {
        trace.advance(Stage::BeforeHook);
        let proceed = lifecycle::before_update(record).await.map_err(|e| {
            trace.fail("before-hook error");
            e
        })?;
        if !proceed {
            trace.fail("declined by observer");
            return Ok(None);
        }

        let mut values = record.dirty_attributes(attribute_names);
        if values.is_empty() {
            trace.advance(Stage::AfterHook);
            lifecycle::after_update(record, &Row::new()).await?;
            trace.done();
            return Ok(Some(0));
        }

        trace.advance(Stage::Executing);
        let key = record.old_primary_key()?;
        let mut condition = key.to_condition(record.table(), &record.schema().primary_key)?;
        let lock = record.definition().lock_column().map(str::to_string);
        if let Some(lock) = &lock {
            let (current, next) = lock_versions(record, lock)?;
            values.insert(lock.clone(), next);
            condition = condition.and(lock_condition(lock, current));
        }

        let rows = match executor.update(record.table(), &values, &condition).await {
            Ok(rows) => rows,
            Err(err) => {
                trace.fail("storage error");
                return Err(err);
            }
        };
        if lock.is_some() && rows == 0 {
            trace.fail("stale object");
            tracing::warn!("Stale update of '{}' with key {}", record.table(), key);
            return Err(ModelError::StaleObject {
                table: record.table().to_string(),
                key: key.to_string(),
                operation: "updated",
            });
        }

        let mut changed = Row::new();
        for (name, value) in &values {
            let previous = record.old_attribute(name).cloned().unwrap_or(Value::Null);
            changed.insert(name.clone(), previous);
            record.set_old_attribute(name, value.clone());
        }
        if let Some(lock) = &lock {
            if let Some(version) = values.get(lock) {
                record.set_raw(lock, version.clone());
            }
        }
        tracing::debug!("Updated {} row(s) of '{}' with key {}", rows, record.table(), key);

        trace.advance(Stage::AfterHook);
        if let Err(err) = lifecycle::after_update(record, &changed).await {
            trace.fail("after-hook error");
            return Err(err);
        }
        trace.done();
        Ok(Some(rows))
    }

    /// Delete the row of an existing record.
    ///
    /// Answers `None` when an observer declines and the number of deleted
    /// rows otherwise. Zero rows is a `StaleObject` error only with an
    /// optimistic-lock column. A deleted record is inert.
    pub async fn delete(&self, record: &mut Record) -> OrmResult<Option<u64>> {
        record.ensure_not_deleted()?;
        if record.is_new_record() {
            return Err(ModelError::Configuration(format!(
                "The record of table '{}' cannot be deleted because it is new",
                record.table()
            )));
        }

        let mut trace = OperationTrace::new("delete", record.table());
        let transactional = record
            .definition()
            .is_transactional(record.scenario(), Operations::DELETE);
        if !transactional {
            let storage = Arc::clone(self.connection.storage());
            return self.delete_internal(&*storage, record, &mut trace).await;
        }

        let snapshot = record.snapshot();
        let transaction = self.connection.storage().begin().await?;
        let result = self.delete_internal(&*transaction, record, &mut trace).await;
        finish_transaction(transaction, result, record, snapshot).await
    }

    async fn delete_internal<E: Executor + ?Sized>(
        &self,
        executor: &E,
        record: &mut Record,
        trace: &mut OperationTrace,
    ) -> OrmResult<Option<u64>> {
        trace.advance(Stage::BeforeHook);
        let proceed = lifecycle::before_delete(record).await.map_err(|e| {
            trace.fail("before-hook error");
            e
        })?;
        if !proceed {
            trace.fail("declined by observer");
            return Ok(None);
        }

        trace.advance(Stage::Executing);
        let key = record.old_primary_key()?;
        let mut condition = key.to_condition(record.table(), &record.schema().primary_key)?;
        let lock = record.definition().lock_column().map(str::to_string);
        if let Some(lock) = &lock {
            condition = condition.and(lock_condition(lock, record.get_attribute(lock).clone()));
        }

        let rows = match executor.delete(record.table(), &condition).await {
            Ok(rows) => rows,
            Err(err) => {
                trace.fail("storage error");
                return Err(err);
            }
        };
        if lock.is_some() && rows == 0 {
            trace.fail("stale object");
            tracing::warn!("Stale delete of '{}' with key {}", record.table(), key);
            return Err(ModelError::StaleObject {
                table: record.table().to_string(),
                key: key.to_string(),
                operation: "deleted",
            });
        }

        record.mark_deleted();
        tracing::debug!("Deleted {} row(s) of '{}' with key {}", rows, record.table(), key);

        trace.advance(Stage::AfterHook);
        if let Err(err) = lifecycle::after_delete(record).await {
            trace.fail("after-hook error");
            return Err(err);
        }
        trace.done();
        Ok(Some(rows))
    }

    /// Insert when new, update otherwise
    pub async fn save(
        &self,
        record: &mut Record,
        run_validation: bool,
        attribute_names: Option<&[&str]>,
    ) -> OrmResult<bool> {
        record.ensure_not_deleted()?;
        if record.is_new_record() {
            self.insert(record, run_validation, attribute_names).await
        } else {
            Ok(self
                .update(record, run_validation, attribute_names)
                .await?
                .is_some())
        }
    }

    /// Bulk update; no hooks, validation or transaction
    pub async fn update_all(&self, table: &str, values: &Row, condition: &Condition) -> OrmResult<u64> {
        let rows = self.connection.storage().update(table, values, condition).await?;
        tracing::debug!("Bulk updated {} row(s) of '{}'", rows, table);
        Ok(rows)
    }

    /// Bulk increment of integer columns by signed deltas
    pub async fn update_all_counters(
        &self,
        table: &str,
        counters: &BTreeMap<String, i64>,
        condition: &Condition,
    ) -> OrmResult<u64> {
        let rows = self
            .connection
            .storage()
            .increment(table, counters, condition)
            .await?;
        tracing::debug!("Bulk incremented {} row(s) of '{}'", rows, table);
        Ok(rows)
    }

    /// Bulk delete; no hooks or transaction
    pub async fn delete_all(&self, table: &str, condition: &Condition) -> OrmResult<u64> {
        let rows = self.connection.storage().delete(table, condition).await?;
        tracing::debug!("Bulk deleted {} row(s) of '{}'", rows, table);
        Ok(rows)
    }

    pub fn find(&self, definition: &Arc<ModelDefinition>) -> ActiveQuery {
        ActiveQuery::new(definition)
    }

    pub async fn find_all(&self, query: &ActiveQuery) -> OrmResult<Vec<Record>> {
        let definition = query.definition();
        let schema = self.connection.table_schema(definition.table()).await?;
        let rows = self.connection.storage().select(query.query()).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_storage(Arc::clone(definition), Arc::clone(&schema), row))
            .collect())
    }

    /// First record of the query
    pub async fn find_one(&self, query: &ActiveQuery) -> OrmResult<Option<Record>> {
        let single = query.clone().limit(1);
        Ok(self.find_all(&single).await?.into_iter().next())
    }

    pub async fn find_by_pk(
        &self,
        definition: &Arc<ModelDefinition>,
        key: impl Into<Key>,
    ) -> OrmResult<Option<Record>> {
        let schema = self.connection.table_schema(definition.table()).await?;
        let condition = key.into().to_condition(definition.table(), &schema.primary_key)?;
        self.find_one(&self.find(definition).filter(condition)).await
    }

    pub async fn count(&self, query: &ActiveQuery) -> OrmResult<u64> {
        self.connection.storage().count(&query.query().without_paging()).await
    }

    /// Reload attributes from storage by the stored primary key.
    ///
    /// Answers `false` when the row no longer exists.
    pub async fn refresh(&self, record: &mut Record) -> OrmResult<bool> {
        record.ensure_not_deleted()?;
        let key = record.old_primary_key()?;
        let definition = Arc::clone(record.definition());
        match self.find_by_pk(&definition, key).await? {
            Some(fresh) => {
                let row = fresh.values().clone();
                record.populate(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Primary key columns plus the lock column
fn returning_columns(record: &Record) -> Vec<String> {
    let mut columns = record.schema().primary_key.clone();
    if let Some(lock) = record.definition().lock_column() {
        if !columns.iter().any(|c| c == lock) {
            columns.push(lock.to_string());
        }
    }
    columns
}

/// Current lock version and the version to write
fn lock_versions(record: &Record, lock: &str) -> OrmResult<(Value, Value)> {
    let current = match record.schema().get_column(lock) {
        Some(column) => column.typecast(record.get_attribute(lock)),
        None => record.get_attribute(lock).clone(),
    };
    let next = match &current {
        Value::Null => Value::Integer(1),
        Value::Integer(version) => Value::Integer(version + 1),
        other => {
            return Err(ModelError::Configuration(format!(
                "Optimistic lock column '{}' of table '{}' holds a {} instead of an integer",
                lock,
                record.table(),
                other.type_name()
            )))
        }
    };
    Ok((current, next))
}

fn lock_condition(lock: &str, current: Value) -> Condition {
    if current.is_null() {
        Condition::is_null(lock)
    } else {
        Condition::eq(lock, current)
    }
}
