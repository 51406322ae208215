//! Model definitions: table binding, scenarios, rules, locking and observers
//!
//! A definition is built once per model and shared (`Arc`) by every record
//! of that model.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::events::RecordObserver;
use crate::validation::{AttributeRule, ValidationRule};

/// Scenario every record starts in
pub const DEFAULT_SCENARIO: &str = "default";

/// Bitmask of write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Operations(u8);

impl Operations {
    pub const NONE: Operations = Operations(0);
    pub const INSERT: Operations = Operations(0x01);
    pub const UPDATE: Operations = Operations(0x02);
    pub const DELETE: Operations = Operations(0x04);
    pub const ALL: Operations = Operations(0x07);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every operation in `other` is set
    pub fn contains(self, other: Operations) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Operations {
    type Output = Operations;

    fn bitor(self, rhs: Operations) -> Operations {
        Operations(self.0 | rhs.0)
    }
}

/// Rules and transactional operations of one scenario
#[derive(Debug, Clone, Default)]
pub struct ScenarioConfig {
    pub rules: Vec<AttributeRule>,
    pub transactional: Operations,
}

impl ScenarioConfig {
    /// Attributes with at least one rule, in first-declared order
    pub fn safe_attributes(&self) -> Vec<String> {
        let mut safe: Vec<String> = Vec::new();
        for rule in &self.rules {
            for attribute in &rule.attributes {
                if !safe.contains(attribute) {
                    safe.push(attribute.clone());
                }
            }
        }
        safe
    }
}

/// Static description of a model
pub struct ModelDefinition {
    table: String,
    scenarios: BTreeMap<String, ScenarioConfig>,
    lock_column: Option<String>,
    observers: Vec<Arc<dyn RecordObserver>>,
    labels: BTreeMap<String, String>,
}

impl ModelDefinition {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(table: impl Into<String>) -> ModelDefinitionBuilder {
        ModelDefinitionBuilder {
            table: table.into(),
            rules: Vec::new(),
            scenarios: vec![(DEFAULT_SCENARIO.to_string(), Operations::NONE)],
            lock_column: None,
            observers: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column holding the optimistic-lock version, if locking is enabled
    pub fn lock_column(&self) -> Option<&str> {
        self.lock_column.as_deref()
    }

    pub fn observers(&self) -> &[Arc<dyn RecordObserver>] {
        &self.observers
    }

    pub fn has_scenario(&self, scenario: &str) -> bool {
        self.scenarios.contains_key(scenario)
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn scenario(&self, scenario: &str) -> Option<&ScenarioConfig> {
        self.scenarios.get(scenario)
    }

    /// Rules active in `scenario`, in declaration order
    pub fn rules_for(&self, scenario: &str) -> &[AttributeRule] {
        self.scenarios
            .get(scenario)
            .map(|s| s.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_transactional(&self, scenario: &str, operation: Operations) -> bool {
        self.scenarios
            .get(scenario)
            .map_or(false, |s| s.transactional.contains(operation))
    }

    /// Attributes that may be mass-assigned in `scenario`
    pub fn safe_attributes(&self, scenario: &str) -> Vec<String> {
        self.scenarios
            .get(scenario)
            .map(ScenarioConfig::safe_attributes)
            .unwrap_or_default()
    }

    /// Human-readable label, e.g. `User Name` for `user_name`
    pub fn attribute_label(&self, attribute: &str) -> String {
        self.labels
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| generate_label(attribute))
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("table", &self.table)
            .field("scenarios", &self.scenarios)
            .field("lock_column", &self.lock_column)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Builder returned by [`ModelDefinition::new`]
pub struct ModelDefinitionBuilder {
    table: String,
    /// `None` applies the rule in every scenario
    rules: Vec<(Option<Vec<String>>, AttributeRule)>,
    scenarios: Vec<(String, Operations)>,
    lock_column: Option<String>,
    observers: Vec<Arc<dyn RecordObserver>>,
    labels: BTreeMap<String, String>,
}

impl ModelDefinitionBuilder {
    /// Rule applied in every scenario
    pub fn rule<V>(mut self, attributes: &[&str], validator: V) -> Self
    where
        V: ValidationRule + 'static,
    {
        self.rules.push((None, AttributeRule::new(attributes, validator)));
        self
    }

    /// Rule applied only in the listed scenarios, which are declared as a side effect
    pub fn rule_on<V>(mut self, scenarios: &[&str], attributes: &[&str], validator: V) -> Self
    where
        V: ValidationRule + 'static,
    {
        for scenario in scenarios {
            self = self.scenario(scenario);
        }
        let on = scenarios.iter().map(|s| s.to_string()).collect();
        self.rules.push((Some(on), AttributeRule::new(attributes, validator)));
        self
    }

    pub fn scenario(mut self, scenario: &str) -> Self {
        if !self.scenarios.iter().any(|(name, _)| name == scenario) {
            self.scenarios.push((scenario.to_string(), Operations::NONE));
        }
        self
    }

    /// Wrap the given operations in a transaction when the record is in `scenario`
    pub fn transactional(mut self, scenario: &str, operations: Operations) -> Self {
        self = self.scenario(scenario);
        for (name, ops) in self.scenarios.iter_mut() {
            if name == scenario {
                *ops = *ops | operations;
            }
        }
        self
    }

    pub fn optimistic_lock(mut self, column: &str) -> Self {
        self.lock_column = Some(column.to_string());
        self
    }

    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: RecordObserver + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn label(mut self, attribute: &str, label: &str) -> Self {
        self.labels.insert(attribute.to_string(), label.to_string());
        self
    }

    pub fn build(self) -> Arc<ModelDefinition> {
        let mut scenarios = BTreeMap::new();
        for (name, transactional) in self.scenarios {
            let rules = self
                .rules
                .iter()
                .filter(|(on, _)| on.as_ref().map_or(true, |on| on.contains(&name)))
                .map(|(_, rule)| rule.clone())
                .collect();
            scenarios.insert(name, ScenarioConfig { rules, transactional });
        }

        Arc::new(ModelDefinition {
            table: self.table,
            scenarios,
            lock_column: self.lock_column,
            observers: self.observers,
            labels: self.labels,
        })
    }
}

/// `first_name`, `first-name` and `firstName` all become `First Name`
fn generate_label(attribute: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for ch in attribute.chars() {
        if ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if ch.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
