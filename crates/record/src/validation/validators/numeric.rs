//! Integer and number validators
//!
//! Both accept numeric strings as well as native numbers, since attribute
//! values often arrive as text from forms.

use async_trait::async_trait;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Validator for whole numbers with optional bounds
#[derive(Debug, Clone, Default)]
pub struct IntegerValidator {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub message: Option<String>,
}

impl IntegerValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn parse(value: &Value) -> Option<i64> {
        match value {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[async_trait]
impl ValidationRule for IntegerValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let Some(number) = Self::parse(value) else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must be an integer", label));
            return Err(ValidationError::with_code(field, message, "integer"));
        };

        if let Some(min) = self.min {
            if number < min {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be no less than {}", label, min),
                    "min",
                ));
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be no greater than {}", label, max),
                    "max",
                ));
            }
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "integer"
    }
}

/// Validator for any numeric value with optional bounds
#[derive(Debug, Clone, Default)]
pub struct NumberValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub message: Option<String>,
}

impl NumberValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl ValidationRule for NumberValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let number = match value {
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            other => other.as_f64(),
        };
        let Some(number) = number else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must be a number", label));
            return Err(ValidationError::with_code(field, message, "number"));
        };

        if let Some(min) = self.min {
            if number < min {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be no less than {}", label, min),
                    "min",
                ));
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be no greater than {}", label, max),
                    "max",
                ));
            }
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "number"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_integer_accepts_numeric_strings() {
        let validator = IntegerValidator::new();
        assert!(validator.validate(&Value::Integer(2), "type", "Type").await.is_ok());
        assert!(validator.validate(&Value::from(" 42 "), "type", "Type").await.is_ok());

        let err = validator.validate(&Value::from("4.5"), "type", "Type").await.unwrap_err();
        assert_eq!(err.message, "Type must be an integer");
        assert!(validator.validate(&Value::Float(1.0), "type", "Type").await.is_err());
    }

    #[tokio::test]
    async fn test_integer_bounds() {
        let validator = IntegerValidator::new().min(1).max(3);
        assert!(validator.validate(&Value::Integer(3), "type", "Type").await.is_ok());

        let err = validator.validate(&Value::Integer(0), "type", "Type").await.unwrap_err();
        assert_eq!(err.code, "min");
        let err = validator.validate(&Value::Integer(9), "type", "Type").await.unwrap_err();
        assert_eq!(err.message, "Type must be no greater than 3");
    }

    #[tokio::test]
    async fn test_number() {
        let validator = NumberValidator::new().min(0.0);
        assert!(validator.validate(&Value::Float(12.5), "cost", "Cost").await.is_ok());
        assert!(validator.validate(&Value::from("12.5000"), "cost", "Cost").await.is_ok());
        assert!(validator.validate(&Value::Integer(-1), "cost", "Cost").await.is_err());
        assert!(validator.validate(&Value::from("cheap"), "cost", "Cost").await.is_err());
    }
}
