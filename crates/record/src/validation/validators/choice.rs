//! Range, boolean and safe-marker validators

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Value must be one of a fixed list
#[derive(Debug, Clone)]
pub struct InValidator {
    pub range: Vec<Value>,
    /// Compare kinds as well as values (`"1"` is not `1`)
    pub strict: bool,
    pub message: Option<String>,
}

impl InValidator {
    pub fn new<I, V>(range: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            range: range.into_iter().map(Into::into).collect(),
            strict: false,
            message: None,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn contains(&self, value: &Value) -> bool {
        self.range.iter().any(|candidate| {
            if self.strict {
                candidate == value
            } else {
                candidate.compare(value) == Ordering::Equal
                    || candidate.to_string() == value.to_string()
            }
        })
    }
}

#[async_trait]
impl ValidationRule for InValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        if self.contains(value) {
            Ok(())
        } else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} is invalid", label));
            Err(ValidationError::with_code(field, message, "in"))
        }
    }

    fn rule_name(&self) -> &'static str {
        "in"
    }
}

/// Value must be a boolean, `0`/`1` or `"true"`/`"false"`
#[derive(Debug, Clone, Default)]
pub struct BooleanValidator {
    pub message: Option<String>,
}

impl BooleanValidator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ValidationRule for BooleanValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let valid = match value {
            Value::Bool(_) => true,
            Value::Integer(i) => *i == 0 || *i == 1,
            Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must be either true or false", label));
            Err(ValidationError::with_code(field, message, "boolean"))
        }
    }

    fn rule_name(&self) -> &'static str {
        "boolean"
    }
}

/// Marks attributes as safe for mass assignment without checking them
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeValidator;

#[async_trait]
impl ValidationRule for SafeValidator {
    async fn validate(&self, _value: &Value, _field: &str, _label: &str) -> Result<(), ValidationError> {
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "safe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_loose_and_strict() {
        let validator = InValidator::new([1, 2, 3]);
        assert!(validator.validate(&Value::Integer(2), "type", "Type").await.is_ok());
        assert!(validator.validate(&Value::from("2"), "type", "Type").await.is_ok());
        assert!(validator.validate(&Value::Integer(7), "type", "Type").await.is_err());

        let strict = InValidator::new([1, 2, 3]).strict();
        assert!(strict.validate(&Value::from("2"), "type", "Type").await.is_err());
    }

    #[tokio::test]
    async fn test_boolean() {
        let validator = BooleanValidator::new();
        assert!(validator.validate(&Value::Bool(false), "active", "Active").await.is_ok());
        assert!(validator.validate(&Value::from("1"), "active", "Active").await.is_ok());
        let err = validator.validate(&Value::Integer(2), "active", "Active").await.unwrap_err();
        assert_eq!(err.message, "Active must be either true or false");
    }

    #[tokio::test]
    async fn test_safe_always_passes() {
        assert!(SafeValidator.validate(&Value::from("anything"), "image", "Image").await.is_ok());
    }
}
