//! Records: one row of a table held in memory
//!
//! A record keeps the attributes assigned to it, the attribute values last
//! read from or written to storage (`old_attributes`), its scenario and the
//! validation errors of the last `validate` call. A record without old
//! attributes is new; a deleted record is inert and refuses further writes.

use std::sync::Arc;

use super::definition::{ModelDefinition, DEFAULT_SCENARIO};
use super::primary_key::Key;
use crate::error::{ModelError, OrmResult};
use crate::schema::TableSchema;
use crate::validation::ValidationErrors;
use crate::value::{Row, Value};

static NULL: Value = Value::Null;

#[derive(Clone)]
pub struct Record {
    definition: Arc<ModelDefinition>,
    schema: Arc<TableSchema>,
    attributes: Row,
    old_attributes: Option<Row>,
    scenario: String,
    errors: ValidationErrors,
    deleted: bool,
}

/// Persistent part of a record, restored when a transaction rolls back
#[derive(Debug, Clone)]
pub(crate) struct RecordState {
    attributes: Row,
    old_attributes: Option<Row>,
    deleted: bool,
}

impl Record {
    pub(crate) fn new(definition: Arc<ModelDefinition>, schema: Arc<TableSchema>) -> Self {
        Self {
            definition,
            schema,
            attributes: Row::new(),
            old_attributes: None,
            scenario: DEFAULT_SCENARIO.to_string(),
            errors: ValidationErrors::new(),
            deleted: false,
        }
    }

    /// Existing record built from a fetched row, typecast per column
    pub(crate) fn from_storage(
        definition: Arc<ModelDefinition>,
        schema: Arc<TableSchema>,
        row: Row,
    ) -> Self {
        let mut record = Self::new(definition, schema);
        record.populate(row);
        record
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.definition.table()
    }

    /// All column names of the bound table, in catalog order
    pub fn attributes(&self) -> Vec<String> {
        self.schema.column_names()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.schema.has_column(name)
    }

    /// Current value; unassigned and unknown attributes read as null
    pub fn get_attribute(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    /// Assigned attributes only
    pub fn values(&self) -> &Row {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        if !self.schema.has_column(name) {
            return Err(ModelError::unknown_attribute(self.table(), name));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Mass assignment. With `safe_only`, attributes without a rule in the
    /// current scenario are skipped.
    pub fn set_attributes<I, K, V>(&mut self, values: I, safe_only: bool) -> OrmResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let safe = if safe_only {
            Some(self.definition.safe_attributes(&self.scenario))
        } else {
            None
        };

        for (name, value) in values {
            let name = name.as_ref();
            if let Some(safe) = &safe {
                if !safe.iter().any(|s| s == name) {
                    tracing::debug!(
                        "Failed to set unsafe attribute '{}' of table '{}'",
                        name,
                        self.table()
                    );
                    continue;
                }
            }
            self.set_attribute(name, value)?;
        }
        Ok(())
    }

    pub fn is_new_record(&self) -> bool {
        self.old_attributes.is_none() && !self.deleted
    }

    /// Deleted from storage; further writes fail with `InertRecord`
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn old_attributes(&self) -> Option<&Row> {
        self.old_attributes.as_ref()
    }

    pub fn old_attribute(&self, name: &str) -> Option<&Value> {
        self.old_attributes.as_ref().and_then(|old| old.get(name))
    }

    /// Assigned attributes whose value differs from the last stored value.
    /// Every assigned attribute is dirty on a new record.
    pub fn dirty_attributes(&self, names: Option<&[&str]>) -> Row {
        self.attributes
            .iter()
            .filter(|(name, _)| names.map_or(true, |names| names.contains(&name.as_str())))
            .filter(|(name, value)| match &self.old_attributes {
                None => true,
                Some(old) => old.get(*name) != Some(*value),
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_attribute_changed(&self, name: &str) -> bool {
        match (self.attributes.get(name), &self.old_attributes) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(value), Some(old)) => old.get(name) != Some(value),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn set_scenario(&mut self, scenario: &str) -> OrmResult<()> {
        if !self.definition.has_scenario(scenario) {
            return Err(ModelError::Configuration(format!(
                "Unknown scenario '{}' for table '{}'",
                scenario,
                self.table()
            )));
        }
        self.scenario = scenario.to_string();
        Ok(())
    }

    /// Run the current scenario's rules, optionally for a subset of attributes.
    ///
    /// Previous errors are cleared first. Once an attribute has an error its
    /// remaining rules are skipped.
    pub async fn validate(&mut self, names: Option<&[&str]>) -> bool {
        self.errors.clear();
        let definition = Arc::clone(&self.definition);

        for rule in definition.rules_for(&self.scenario) {
            for attribute in &rule.attributes {
                if let Some(names) = names {
                    if !names.contains(&attribute.as_str()) {
                        continue;
                    }
                }
                if self.errors.has_field_errors(attribute) {
                    continue;
                }
                let value = self.get_attribute(attribute);
                if rule.validator.skip_on_empty() && value.is_empty() {
                    continue;
                }
                let label = definition.attribute_label(attribute);
                let result = rule.validator.validate(value, attribute, &label).await;
                if let Err(error) = result {
                    self.errors.add(error);
                }
            }
        }

        self.errors.is_empty()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, attribute: &str, message: &str) {
        self.errors.add_error(attribute, message);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Assign column defaults from the catalog. With `skip_if_set`, only
    /// attributes that are currently null are filled.
    pub fn load_default_values(&mut self, skip_if_set: bool) -> &mut Self {
        let schema = Arc::clone(&self.schema);
        for column in &schema.columns {
            if let Some(default) = &column.default_value {
                if !skip_if_set || self.get_attribute(&column.name).is_null() {
                    self.attributes.insert(column.name.clone(), default.clone());
                }
            }
        }
        self
    }

    /// Same table and primary key; new records are never equal
    pub fn equals(&self, other: &Record) -> bool {
        if self.is_new_record() || other.is_new_record() {
            return false;
        }
        self.table() == other.table() && self.primary_key() == other.primary_key()
    }

    /// Current primary key value(s)
    pub fn primary_key(&self) -> Key {
        Key::from_row(&self.schema.primary_key, &self.attributes)
    }

    /// Primary key as last stored
    pub fn old_primary_key(&self) -> OrmResult<Key> {
        let old = self
            .old_attributes
            .as_ref()
            .filter(|_| !self.schema.primary_key.is_empty())
            .ok_or_else(|| ModelError::MissingPrimaryKey(self.table().to_string()))?;
        Ok(Key::from_row(&self.schema.primary_key, old))
    }

    /// Assigned attributes as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    pub(crate) fn ensure_not_deleted(&self) -> OrmResult<()> {
        if self.deleted {
            return Err(ModelError::InertRecord(self.table().to_string()));
        }
        Ok(())
    }

    /// Replace attributes and old attributes with a fetched row
    pub(crate) fn populate(&mut self, row: Row) {
        let attributes: Row = row
            .into_iter()
            .filter_map(|(name, value)| {
                self.schema
                    .get_column(&name)
                    .map(|column| (name, column.typecast(&value)))
            })
            .collect();
        self.old_attributes = Some(attributes.clone());
        self.attributes = attributes;
        self.deleted = false;
    }

    /// Assign without column or inert checks
    pub(crate) fn set_raw(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub(crate) fn set_old_attributes(&mut self, old: Option<Row>) {
        self.old_attributes = old;
    }

    pub(crate) fn set_old_attribute(&mut self, name: &str, value: Value) {
        if let Some(old) = self.old_attributes.as_mut() {
            old.insert(name.to_string(), value);
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.old_attributes = None;
        self.deleted = true;
    }

    pub(crate) fn snapshot(&self) -> RecordState {
        RecordState {
            attributes: self.attributes.clone(),
            old_attributes: self.old_attributes.clone(),
            deleted: self.deleted,
        }
    }

    /// Roll back to a snapshot; validation errors are kept
    pub(crate) fn restore(&mut self, state: RecordState) {
        self.attributes = state.attributes;
        self.old_attributes = state.old_attributes;
        self.deleted = state.deleted;
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.definition.table())
            .field("attributes", &self.attributes)
            .field("new", &self.is_new_record())
            .field("scenario", &self.scenario)
            .field("deleted", &self.deleted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ColumnType};
    use crate::validation::{IntegerValidator, RequiredValidator, SafeValidator, StringValidator};
    use crate::value::row;

    fn user_info() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("user_info")
                .column(ColumnSchema::primary_key("id"))
                .column(ColumnSchema::new("name", ColumnType::String).size(255).not_null())
                .column(ColumnSchema::new("phone", ColumnType::String).size(20))
                .column(ColumnSchema::new("type", ColumnType::Integer).not_null().default_value(2))
                .column(ColumnSchema::new("image", ColumnType::String)),
        )
    }

    fn definition() -> Arc<ModelDefinition> {
        ModelDefinition::new("user_info")
            .rule(&["name", "phone"], RequiredValidator::new())
            .rule(&["name"], StringValidator::new().max(5))
            .rule(&["type"], IntegerValidator::new().min(1).max(3))
            .rule_on(&["upload"], &["image"], SafeValidator)
            .build()
    }

    fn record() -> Record {
        Record::new(definition(), user_info())
    }

    #[test]
    fn test_attributes_follow_catalog_order() {
        assert_eq!(record().attributes(), vec!["id", "name", "phone", "type", "image"]);
    }

    #[test]
    fn test_unknown_attribute() {
        let mut record = record();
        let result = record.set_attribute("nickname", "x");
        assert!(matches!(result, Err(ModelError::UnknownAttribute { .. })));
        assert!(record.get_attribute("nickname").is_null());
    }

    #[test]
    fn test_new_record_is_fully_dirty() {
        let mut record = record();
        record.set_attribute("name", "Ann").unwrap();
        record.set_attribute("phone", "123").unwrap();
        assert!(record.is_new_record());
        assert_eq!(record.dirty_attributes(None).len(), 2);
        assert_eq!(record.dirty_attributes(Some(&["phone"])).len(), 1);
    }

    #[test]
    fn test_dirty_tracking_on_existing_record() {
        let mut record = Record::from_storage(
            definition(),
            user_info(),
            row([("id", Value::Integer(1)), ("name", Value::from("Ann")), ("type", Value::from("2"))]),
        );
        assert!(!record.is_new_record());
        assert_eq!(record.get_attribute("type"), &Value::Integer(2));
        assert!(record.dirty_attributes(None).is_empty());

        record.set_attribute("name", "Bob").unwrap();
        let dirty = record.dirty_attributes(None);
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty.get("name"), Some(&Value::from("Bob")));
        assert!(record.is_attribute_changed("name"));
        assert_eq!(record.old_attribute("name"), Some(&Value::from("Ann")));

        // strict equality: "2" is not 2
        record.set_attribute("type", "2").unwrap();
        assert!(record.is_attribute_changed("type"));
    }

    #[tokio::test]
    async fn test_validate_stops_at_first_failure_per_attribute() {
        let mut record = record();
        record.set_attribute("type", 9).unwrap();

        assert!(!record.validate(None).await);
        assert_eq!(record.errors().messages("name"), vec!["Name is required"]);
        assert_eq!(record.errors().messages("phone"), vec!["Phone is required"]);
        assert_eq!(record.errors().messages("type"), vec!["Type must be no greater than 3"]);

        record.set_attribute("name", "Alexander").unwrap();
        record.set_attribute("phone", "555").unwrap();
        record.set_attribute("type", 1).unwrap();
        assert!(!record.validate(None).await);
        assert_eq!(record.errors().total_errors(), 1);
        assert!(record.errors().has_field_errors("name"));

        record.set_attribute("name", "Ann").unwrap();
        assert!(record.validate(None).await);
        assert!(!record.has_errors());
    }

    #[tokio::test]
    async fn test_validate_subset() {
        let mut record = record();
        record.set_attribute("name", "Ann").unwrap();
        assert!(record.validate(Some(&["name"])).await);
        assert!(!record.validate(Some(&["phone"])).await);
    }

    #[test]
    fn test_scenarios() {
        let mut record = record();
        assert_eq!(record.scenario(), DEFAULT_SCENARIO);
        record.set_scenario("upload").unwrap();
        assert!(matches!(record.set_scenario("bogus"), Err(ModelError::Configuration(_))));
        assert_eq!(record.scenario(), "upload");
    }

    #[test]
    fn test_safe_mass_assignment() {
        let mut record = record();
        record
            .set_attributes([("name", "Ann"), ("image", "a.png")], true)
            .unwrap();
        assert_eq!(record.get_attribute("name"), &Value::from("Ann"));
        assert!(record.get_attribute("image").is_null());

        record.set_scenario("upload").unwrap();
        record.set_attributes([("image", "a.png")], true).unwrap();
        assert_eq!(record.get_attribute("image"), &Value::from("a.png"));
    }

    #[test]
    fn test_load_default_values() {
        let mut record = record();
        record.set_attribute("type", 3).unwrap();
        record.load_default_values(true);
        assert_eq!(record.get_attribute("type"), &Value::Integer(3));
        record.load_default_values(false);
        assert_eq!(record.get_attribute("type"), &Value::Integer(2));
    }

    #[test]
    fn test_equals_and_keys() {
        let a = Record::from_storage(definition(), user_info(), row([("id", 1), ("type", 2)]));
        let b = Record::from_storage(definition(), user_info(), row([("id", 1), ("type", 3)]));
        let c = Record::from_storage(definition(), user_info(), row([("id", 2)]));
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(!record().equals(&a));

        assert_eq!(a.old_primary_key().unwrap(), Key::from(1));
        assert!(matches!(record().old_primary_key(), Err(ModelError::MissingPrimaryKey(_))));
    }

    #[test]
    fn test_deleted_record_is_inert() {
        let mut record = Record::from_storage(definition(), user_info(), row([("id", 1)]));
        record.mark_deleted();
        assert!(!record.is_new_record());
        assert!(record.is_deleted());
        assert!(matches!(record.set_attribute("name", "x"), Err(ModelError::InertRecord(_))));
    }

    #[test]
    fn test_restore_keeps_errors() {
        let mut record = record();
        let snapshot = record.snapshot();
        record.set_old_attributes(Some(row([("id", 1)])));
        record.add_error("name", "taken");
        record.restore(snapshot);
        assert!(record.is_new_record());
        assert!(record.has_errors());
    }
}
