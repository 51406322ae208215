#![allow(dead_code)]

use std::sync::Arc;

use elif_record::validation::{IntegerValidator, PatternValidator, RequiredValidator, StringValidator};
use elif_record::{
    ColumnSchema, ColumnType, Connection, MemoryStorage, ModelDefinition, Operations, Persister,
    Record, TableSchema, DEFAULT_SCENARIO,
};

pub fn user_info_table() -> TableSchema {
    TableSchema::new("user_info")
        .column(ColumnSchema::primary_key("id"))
        .column(ColumnSchema::new("name", ColumnType::String).size(50).not_null())
        .column(ColumnSchema::new("phone", ColumnType::String).size(20))
        .column(ColumnSchema::new("type", ColumnType::Integer).not_null().default_value(2))
        .column(ColumnSchema::new("birthday", ColumnType::Date))
        .column(ColumnSchema::new("image", ColumnType::String))
        .column(ColumnSchema::new("version", ColumnType::Integer).not_null().default_value(0))
}

pub fn user_info() -> Arc<ModelDefinition> {
    ModelDefinition::new("user_info")
        .rule(&["name", "phone"], RequiredValidator::new())
        .rule(&["name"], StringValidator::new().max(50))
        .rule(&["type"], IntegerValidator::new().min(1).max(3))
        .rule(
            &["phone"],
            PatternValidator::new(r"^\d{3,20}$").expect("valid pattern"),
        )
        .transactional(DEFAULT_SCENARIO, Operations::ALL)
        .optimistic_lock("version")
        .build()
}

pub struct Fixture {
    pub storage: MemoryStorage,
    pub connection: Connection,
    pub persister: Persister,
}

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture() -> Fixture {
    init_tracing();
    let storage = MemoryStorage::new();
    storage.create_table(user_info_table());
    let connection = Connection::new(Arc::new(storage.clone()));
    Fixture {
        persister: Persister::new(connection.clone()),
        storage,
        connection,
    }
}

pub async fn new_user(fixture: &Fixture, name: &str, phone: &str) -> Record {
    let mut record = fixture.connection.instantiate(&user_info()).await.unwrap();
    record.set_attribute("name", name).unwrap();
    record.set_attribute("phone", phone).unwrap();
    record
}

/// Insert users with the given ids, in order
pub async fn seed_ids(fixture: &Fixture, ids: &[i64]) {
    for id in ids {
        let mut record = new_user(fixture, &format!("user{}", id), &format!("555{}", id)).await;
        record.set_attribute("id", *id).unwrap();
        assert!(fixture.persister.insert(&mut record, true, None).await.unwrap());
    }
}
