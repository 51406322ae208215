//! Pattern-based validator using regular expressions

use async_trait::async_trait;
use regex::Regex;

use crate::validation::error::ValidationError;
use crate::validation::traits::ValidationRule;
use crate::value::Value;

/// Validator for custom regular expression patterns
#[derive(Debug, Clone)]
pub struct PatternValidator {
    pattern: Regex,
    pub message: Option<String>,
    /// Fail when the pattern matches instead of when it does not
    pub not: bool,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?))
    }

    pub fn from_regex(regex: Regex) -> Self {
        Self {
            pattern: regex,
            message: None,
            not: false,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn not(mut self) -> Self {
        self.not = true;
        self
    }

    pub fn pattern_string(&self) -> &str {
        self.pattern.as_str()
    }
}

#[async_trait]
impl ValidationRule for PatternValidator {
    async fn validate(&self, value: &Value, field: &str, label: &str) -> Result<(), ValidationError> {
        let matched = value
            .as_str()
            .map(|text| self.pattern.is_match(text) != self.not)
            .unwrap_or(false);
        if matched {
            Ok(())
        } else {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} is invalid", label));
            Err(ValidationError::with_code(field, message, "pattern"))
        }
    }

    fn rule_name(&self) -> &'static str {
        "pattern"
    }
}
