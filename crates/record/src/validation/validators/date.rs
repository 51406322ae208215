//! Date validator

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Value must be a date, or a string in the configured format
#[derive(Debug, Clone)]
pub struct DateValidator {
    /// chrono format string, `%Y-%m-%d` by default
    pub format: String,
    pub message: Option<String>,
}

impl DateValidator {
    pub fn new() -> Self {
        Self::with_format("%Y-%m-%d")
    }

    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Default for DateValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationRule for DateValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let valid = match value {
            Value::Date(_) | Value::DateTime(_) => true,
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), &self.format).is_ok(),
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("The format of {} is invalid", label));
            Err(ValidationError::with_code(field, message, "date"))
        }
    }

    fn rule_name(&self) -> &'static str {
        "date"
    }
}
