//! Required attribute validator

use async_trait::async_trait;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Validator that ensures an attribute is present and not blank
#[derive(Debug, Clone, Default)]
pub struct RequiredValidator {
    /// Custom error message
    pub message: Option<String>,
}

impl RequiredValidator {
    pub fn new() -> Self {
        Self { message: None }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

#[async_trait]
impl ValidationRule for RequiredValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} is required", label));
            Err(ValidationError::with_code(field, message, "required"))
        } else {
            Ok(())
        }
    }

    fn rule_name(&self) -> &'static str {
        "required"
    }

    fn skip_on_empty(&self) -> bool {
        false
    }
}
