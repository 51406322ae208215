//! String validator with length constraints

use async_trait::async_trait;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Validator for string values and their length in characters
#[derive(Debug, Clone, Default)]
pub struct StringValidator {
    /// Minimum length (inclusive)
    pub min: Option<usize>,
    /// Maximum length (inclusive)
    pub max: Option<usize>,
    /// Exact length required
    pub exact: Option<usize>,
    pub message: Option<String>,
}

impl StringValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn exact(mut self, exact: usize) -> Self {
        self.exact = Some(exact);
        self
    }

    pub fn range(mut self, min: usize, max: usize) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn error(&self, field: &str, message: String, code: &str) -> ValidationError {
        ValidationError::with_code(field, self.message.clone().unwrap_or(message), code)
    }
}

#[async_trait]
impl ValidationRule for StringValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let Some(text) = value.as_str() else {
            return Err(self.error(field, format!("{} must be a string", label), "string"));
        };
        let length = text.chars().count();

        if let Some(exact) = self.exact {
            if length != exact {
                return Err(self.error(
                    field,
                    format!("{} must be exactly {} characters long", label, exact),
                    "length_exact",
                ));
            }
            return Ok(());
        }
        if let Some(min) = self.min {
            if length < min {
                return Err(self.error(
                    field,
                    format!("{} must be at least {} characters long", label, min),
                    "length_min",
                ));
            }
        }
        if let Some(max) = self.max {
            if length > max {
                return Err(self.error(
                    field,
                    format!("{} must be at most {} characters long", label, max),
                    "length_max",
                ));
            }
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "string"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_max_length_counts_characters() {
        let validator = StringValidator::new().max(11);
        assert!(validator.validate(&Value::from("13800138000"), "phone", "Phone").await.is_ok());
        assert!(validator.validate(&Value::from("ééééé"), "phone", "Phone").await.is_ok());

        let err = validator
            .validate(&Value::from("138001380001"), "phone", "Phone")
            .await
            .unwrap_err();
        assert_eq!(err.message, "Phone must be at most 11 characters long");
        assert_eq!(err.code, "length_max");
    }

    #[tokio::test]
    async fn test_rejects_non_strings() {
        let validator = StringValidator::new();
        let err = validator.validate(&Value::Integer(5), "name", "Name").await.unwrap_err();
        assert_eq!(err.code, "string");
    }

    #[tokio::test]
    async fn test_exact_and_min() {
        assert!(StringValidator::new()
            .exact(3)
            .validate(&Value::from("abcd"), "code", "Code")
            .await
            .is_err());
        assert!(StringValidator::new()
            .min(2)
            .validate(&Value::from("a"), "code", "Code")
            .await
            .is_err());
    }
}
