mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use elif_record::storage::StatementKind;
use elif_record::{
    row, ColumnSchema, ColumnType, Condition, Connection, EventError, Key, MemoryStorage,
    ModelDefinition, ModelError, Persister, Record, RecordObserver, TableSchema, Value,
};

use common::{fixture, new_user, user_info};

#[tokio::test]
async fn insert_assigns_generated_key_and_lock_version() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    assert!(record.is_new_record());

    assert!(fx.persister.insert(&mut record, true, None).await.unwrap());
    assert!(!record.is_new_record());
    assert_eq!(record.get_attribute("id"), &Value::Integer(1));
    assert_eq!(record.get_attribute("version"), &Value::Integer(0));
    assert!(record.dirty_attributes(None).is_empty());
}

#[tokio::test]
async fn insert_then_find_by_pk_round_trips() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    record
        .set_attribute("birthday", Value::from("1990-04-02"))
        .unwrap();
    fx.persister.insert(&mut record, false, None).await.unwrap();

    let found = fx
        .persister
        .find_by_pk(&user_info(), record.primary_key())
        .await
        .unwrap()
        .expect("inserted row");

    for (name, value) in record.values() {
        if name == "birthday" {
            continue;
        }
        assert_eq!(found.get_attribute(name), value, "attribute {}", name);
    }
    // storage default and typecast on load
    assert_eq!(found.get_attribute("type"), &Value::Integer(2));
    assert!(matches!(found.get_attribute("birthday"), Value::Date(_)));
    assert!(found.equals(&record));
}

#[tokio::test]
async fn insert_with_failed_validation_touches_no_storage() {
    let fx = fixture();
    let mut record = fx.connection.instantiate(&user_info()).await.unwrap();
    record.set_attribute("name", "Ann").unwrap();
    fx.storage.clear_journal();

    assert!(!fx.persister.insert(&mut record, true, None).await.unwrap());
    assert_eq!(fx.storage.statement_count(), 0);
    assert_eq!(record.errors().first("phone"), Some("Phone is required"));
    assert!(record.is_new_record());
}

#[tokio::test]
async fn insert_rejects_existing_record() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    let result = fx.persister.insert(&mut record, true, None).await;
    assert!(matches!(result, Err(ModelError::Configuration(_))));
}

#[tokio::test]
async fn update_writes_only_dirty_attributes_and_bumps_version() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    let mut loaded = fx.persister.find_by_pk(&user_info(), 1).await.unwrap().unwrap();
    assert!(loaded.dirty_attributes(None).is_empty());

    loaded.set_attribute("name", "Anna").unwrap();
    assert_eq!(loaded.dirty_attributes(None).len(), 1);

    assert_eq!(fx.persister.update(&mut loaded, true, None).await.unwrap(), Some(1));
    assert_eq!(loaded.get_attribute("version"), &Value::Integer(1));
    assert_eq!(loaded.old_attribute("name"), Some(&Value::from("Anna")));
    assert!(loaded.dirty_attributes(None).is_empty());

    let stored = fx.storage.rows("user_info");
    assert_eq!(stored[0].get("name"), Some(&Value::from("Anna")));
    assert_eq!(stored[0].get("version"), Some(&Value::Integer(1)));
}

#[tokio::test]
async fn update_without_changes_is_a_benign_no_op() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();
    fx.storage.clear_journal();

    assert_eq!(fx.persister.update(&mut record, true, None).await.unwrap(), Some(0));
    assert_eq!(fx.storage.count_statements(StatementKind::Update), 0);
}

#[tokio::test]
async fn update_with_validation_error_answers_none() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    record.set_attribute("type", 7).unwrap();
    assert_eq!(fx.persister.update(&mut record, true, None).await.unwrap(), None);
    assert!(record.errors().has_field_errors("type"));
    assert!(fx.persister.save(&mut record, false, None).await.unwrap());
}

#[tokio::test]
async fn stale_update_fails_and_rolls_back() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    let mut first = fx.persister.find_by_pk(&user_info(), 1).await.unwrap().unwrap();
    let mut second = fx.persister.find_by_pk(&user_info(), 1).await.unwrap().unwrap();

    first.set_attribute("name", "First").unwrap();
    assert_eq!(fx.persister.update(&mut first, true, None).await.unwrap(), Some(1));

    second.set_attribute("name", "Second").unwrap();
    fx.storage.clear_journal();
    let err = fx.persister.update(&mut second, true, None).await.unwrap_err();
    assert!(err.is_stale_object());
    assert_eq!(err.to_string(), "The object being updated is outdated: user_info(1)");

    assert_eq!(fx.storage.count_statements(StatementKind::Rollback), 1);
    assert_eq!(fx.storage.count_statements(StatementKind::Commit), 0);
    assert_eq!(second.get_attribute("version"), &Value::Integer(0));
    assert_eq!(second.old_attribute("name"), Some(&Value::from("Ann")));
    assert_eq!(fx.storage.rows("user_info")[0].get("name"), Some(&Value::from("First")));
}

#[tokio::test]
async fn delete_makes_the_record_inert() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    assert_eq!(fx.persister.delete(&mut record).await.unwrap(), Some(1));
    assert!(record.is_deleted());
    assert!(!record.is_new_record());
    assert!(fx.storage.rows("user_info").is_empty());

    let result = fx.persister.save(&mut record, true, None).await;
    assert!(matches!(result, Err(ModelError::InertRecord(_))));
    let result = fx.persister.delete(&mut record).await;
    assert!(matches!(result, Err(ModelError::InertRecord(_))));
}

#[tokio::test]
async fn stale_delete_keeps_the_row() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();

    let mut other = fx.persister.find_by_pk(&user_info(), 1).await.unwrap().unwrap();
    other.set_attribute("phone", "5550199").unwrap();
    fx.persister.update(&mut other, true, None).await.unwrap();

    let err = fx.persister.delete(&mut record).await.unwrap_err();
    assert!(matches!(err, ModelError::StaleObject { operation: "deleted", .. }));
    assert!(!record.is_deleted());
    assert_eq!(fx.storage.rows("user_info").len(), 1);
}

#[tokio::test]
async fn delete_without_lock_column_reports_zero_rows() {
    let storage = MemoryStorage::new();
    storage.create_table(
        TableSchema::new("tag")
            .column(ColumnSchema::primary_key("id"))
            .column(ColumnSchema::new("name", ColumnType::String)),
    );
    let persister = Persister::new(Connection::new(Arc::new(storage.clone())));
    let definition = ModelDefinition::new("tag").build();

    let mut record = persister.connection().instantiate(&definition).await.unwrap();
    record.set_attribute("name", "rust").unwrap();
    persister.insert(&mut record, false, None).await.unwrap();

    persister.delete_all("tag", &Condition::All).await.unwrap();
    assert_eq!(persister.delete(&mut record).await.unwrap(), Some(0));
}

struct Blacklist;

#[async_trait]
impl RecordObserver for Blacklist {
    async fn saving(&self, record: &mut Record) -> Result<(), EventError> {
        if record.get_attribute("phone").as_str() == Some("5550666") {
            return Err(EventError::validation("phone", "Phone is blacklisted"));
        }
        Ok(())
    }
}

struct FailingAudit;

#[async_trait]
impl RecordObserver for FailingAudit {
    async fn created(&self, _record: &Record) -> Result<(), EventError> {
        Err(EventError::observer("audit log unavailable"))
    }
}

#[tokio::test]
async fn observer_cancellation_declines_and_rolls_back() {
    let fx = fixture();
    let definition = ModelDefinition::new("user_info")
        .transactional(elif_record::DEFAULT_SCENARIO, elif_record::Operations::INSERT)
        .observer(Blacklist)
        .build();
    let mut record = fx.connection.instantiate(&definition).await.unwrap();
    record.set_attributes([("name", "Eve"), ("phone", "5550666")], false).unwrap();

    fx.storage.clear_journal();
    assert!(!fx.persister.insert(&mut record, true, None).await.unwrap());
    assert_eq!(record.errors().first("phone"), Some("Phone is blacklisted"));
    assert_eq!(fx.storage.count_statements(StatementKind::Insert), 0);
    assert_eq!(fx.storage.count_statements(StatementKind::Rollback), 1);
}

#[tokio::test]
async fn after_hook_failure_rolls_back_and_restores_the_record() {
    let fx = fixture();
    let definition = ModelDefinition::new("user_info")
        .transactional(elif_record::DEFAULT_SCENARIO, elif_record::Operations::INSERT)
        .observer(FailingAudit)
        .build();
    let mut record = fx.connection.instantiate(&definition).await.unwrap();
    record.set_attributes([("name", "Ann"), ("phone", "5550100")], false).unwrap();

    let result = fx.persister.insert(&mut record, false, None).await;
    assert!(matches!(result, Err(ModelError::Event(_))));
    assert!(record.is_new_record());
    assert!(record.get_attribute("id").is_null());
    assert!(fx.storage.rows("user_info").is_empty());
}

#[tokio::test]
async fn storage_failure_inside_transaction_propagates() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.storage.fail_next(StatementKind::Insert, "connection reset");

    let result = fx.persister.insert(&mut record, true, None).await;
    assert!(matches!(result, Err(ModelError::Storage(_))));
    assert!(record.is_new_record());
    assert_eq!(fx.storage.count_statements(StatementKind::Rollback), 1);
}

#[tokio::test]
async fn bulk_operations_bypass_hooks() {
    let fx = fixture();
    common::seed_ids(&fx, &[1, 2, 3]).await;

    let updated = fx
        .persister
        .update_all("user_info", &row([("type", 3)]), &Condition::gt("id", 1))
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let mut counters = BTreeMap::new();
    counters.insert("version".to_string(), 5);
    let bumped = fx
        .persister
        .update_all_counters("user_info", &counters, &Condition::eq("id", 2))
        .await
        .unwrap();
    assert_eq!(bumped, 1);

    let mut record = fx.persister.find_by_pk(&user_info(), 2).await.unwrap().unwrap();
    assert_eq!(record.get_attribute("type"), &Value::Integer(3));
    assert_eq!(record.get_attribute("version"), &Value::Integer(5));

    fx.persister
        .update_all("user_info", &row([("name", "Renamed")]), &Condition::eq("id", 2))
        .await
        .unwrap();
    assert!(fx.persister.refresh(&mut record).await.unwrap());
    assert_eq!(record.get_attribute("name"), &Value::from("Renamed"));

    let deleted = fx
        .persister
        .delete_all("user_info", &Condition::is_in("id", [1, 3]))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    let query = fx.persister.find(&user_info());
    assert_eq!(fx.persister.count(&query).await.unwrap(), 1);
}

#[tokio::test]
async fn refresh_of_vanished_row() {
    let fx = fixture();
    let mut record = new_user(&fx, "Ann", "5550100").await;
    fx.persister.insert(&mut record, true, None).await.unwrap();
    fx.persister.delete_all("user_info", &Condition::All).await.unwrap();
    assert!(!fx.persister.refresh(&mut record).await.unwrap());
}

#[tokio::test]
async fn composite_primary_keys() {
    let storage = MemoryStorage::new();
    storage.create_table(
        TableSchema::new("order_item")
            .column(ColumnSchema::new("order_id", ColumnType::Integer).key())
            .column(ColumnSchema::new("item_id", ColumnType::Integer).key())
            .column(ColumnSchema::new("quantity", ColumnType::Integer)),
    );
    let persister = Persister::new(Connection::new(Arc::new(storage)));
    let definition = ModelDefinition::new("order_item").build();

    let mut record = persister.connection().instantiate(&definition).await.unwrap();
    record
        .set_attributes([("order_id", 1), ("item_id", 2), ("quantity", 5)], false)
        .unwrap();
    assert!(persister.insert(&mut record, true, None).await.unwrap());

    let key = Key::Composite(vec![
        ("order_id".to_string(), Value::Integer(1)),
        ("item_id".to_string(), Value::Integer(2)),
    ]);
    assert_eq!(record.old_primary_key().unwrap(), key);

    let found = persister.find_by_pk(&definition, key).await.unwrap().unwrap();
    assert_eq!(found.get_attribute("quantity"), &Value::Integer(5));

    let wrong_shape = persister.find_by_pk(&definition, 1).await;
    assert!(matches!(wrong_shape, Err(ModelError::MissingPrimaryKey(_))));
}

#[tokio::test]
async fn find_with_filters_and_order() {
    let fx = fixture();
    common::seed_ids(&fx, &[1, 2, 3, 4]).await;

    let query = fx
        .persister
        .find(&user_info())
        .filter(Condition::lte("id", 3))
        .order_by_desc("id");
    let ids: Vec<Value> = fx
        .persister
        .find_all(&query)
        .await
        .unwrap()
        .iter()
        .map(|r| r.get_attribute("id").clone())
        .collect();
    assert_eq!(ids, vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]);

    let first = fx.persister.find_one(&query).await.unwrap().unwrap();
    assert_eq!(first.primary_key(), Key::from(3));
}
