//! Attribute validation
//!
//! Rules are declared on a model definition per scenario and evaluated by
//! `Record::validate`. A failed rule is reported as a per-attribute message,
//! never as an error.

pub mod error;
pub mod traits;
pub mod validators;

pub use error::{ValidationError, ValidationErrors};
pub use traits::{AttributeRule, ValidationRule};
pub use validators::{
    BooleanValidator, CustomValidator, DateValidator, InValidator, IntegerValidator,
    NumberValidator, PatternValidator, RequiredValidator, SafeValidator, StringValidator,
};
