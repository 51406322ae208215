//! Core validation traits

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::ValidationError;
use crate::value::Value;

/// Core validation trait that all validators must implement
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Validate one attribute value. `label` is the human-readable attribute
    /// name used in messages.
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError>;

    /// Get the validation rule name/type
    fn rule_name(&self) -> &'static str;

    /// Whether empty values (null, blank strings) bypass the rule
    fn skip_on_empty(&self) -> bool {
        true
    }
}

/// A validator bound to the attributes it checks
#[derive(Clone)]
pub struct AttributeRule {
    pub attributes: Vec<String>,
    pub validator: Arc<dyn ValidationRule>,
}

impl AttributeRule {
    pub fn new<V>(attributes: &[&str], validator: V) -> Self
    where
        V: ValidationRule + 'static,
    {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            validator: Arc::new(validator),
        }
    }

    pub fn applies_to(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

impl fmt::Debug for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRule")
            .field("attributes", &self.attributes)
            .field("rule", &self.validator.rule_name())
            .finish()
    }
}
