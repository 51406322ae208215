//! Custom validation closures

use std::sync::Arc;

use async_trait::async_trait;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Closure returning `Err(message)` when the value is invalid
pub type ValidationFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Custom validator that accepts user-defined validation functions
#[derive(Clone)]
pub struct CustomValidator {
    pub name: String,
    validator: ValidationFn,
    /// Also run on empty values
    pub check_empty: bool,
}

impl CustomValidator {
    pub fn new<F>(name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validator: Arc::new(validator),
            check_empty: false,
        }
    }

    pub fn check_empty(mut self) -> Self {
        self.check_empty = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomValidator")
            .field("name", &self.name)
            .field("check_empty", &self.check_empty)
            .finish()
    }
}

#[async_trait]
impl ValidationRule for CustomValidator {
    async fn validate(&self, value: &Value, field: &str, _label: &str) -> Result<(), ValidationError> {
        (self.validator)(value).map_err(|message| ValidationError::with_code(field, message, self.name.clone()))
    }

    fn rule_name(&self) -> &'static str {
        "custom"
    }

    fn skip_on_empty(&self) -> bool {
        !self.check_empty
    }
}
