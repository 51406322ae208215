//! Validation error types
//!
//! Errors are kept per attribute, in the order the rules reported them.
//! Attributes are ordered by name.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Individual validation error for a specific attribute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    /// The attribute that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: "validation_failed".to_string(),
        }
    }

    /// Create a validation error with a specific code
    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation errors of one record, grouped by attribute
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    /// Add a simple validation error with field and message
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of attributes with errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn total_errors(&self) -> usize {
        self.errors.values().map(|v| v.len()).sum()
    }

    pub fn get_field_errors(&self, field: &str) -> Option<&Vec<ValidationError>> {
        self.errors.get(field)
    }

    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.get(field).map_or(false, |e| !e.is_empty())
    }

    /// Messages for one attribute, in reporting order
    pub fn messages(&self, field: &str) -> Vec<&str> {
        self.errors
            .get(field)
            .map(|errors| errors.iter().map(|e| e.message.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|errors| errors.first())
            .map(|e| e.message.as_str())
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn clear_field(&mut self, field: &str) {
        self.errors.remove(field);
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    /// Convert to a JSON-serializable format
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": "validation_failed",
                "message": "Validation failed",
                "fields": self.errors
            }
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "No validation errors")
        } else {
            write!(f, "Validation failed for {} field(s):", self.errors.len())?;
            for (field, field_errors) in &self.errors {
                for error in field_errors {
                    write!(f, "\n  {}: {}", field, error.message)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_keep_reporting_order() {
        let mut errors = ValidationErrors::new();
        errors.add_error("name", "Name is required");
        errors.add_error("name", "Name is too short");
        errors.add(ValidationError::with_code("phone", "Phone is invalid", "pattern"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.total_errors(), 3);
        assert_eq!(errors.messages("name"), vec!["Name is required", "Name is too short"]);
        assert_eq!(errors.first("phone"), Some("Phone is invalid"));
        assert!(!errors.has_field_errors("type"));
    }

    #[test]
    fn test_merge_and_clear() {
        let mut errors = ValidationErrors::new();
        errors.add_error("name", "a");
        let mut other = ValidationErrors::new();
        other.add_error("name", "b");
        errors.merge(other);
        assert_eq!(errors.messages("name"), vec!["a", "b"]);

        errors.clear_field("name");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_display() {
        let mut errors = ValidationErrors::new();
        errors.add_error("phone", "Phone is required");
        assert_eq!(
            errors.to_string(),
            "Validation failed for 1 field(s):\n  phone: Phone is required"
        );
    }
}
