//! Built-in validators

pub mod choice;
pub mod custom;
pub mod date;
pub mod length;
pub mod numeric;
pub mod pattern;
pub mod required;

pub use choice::{BooleanValidator, InValidator, SafeValidator};
pub use custom::CustomValidator;
pub use date::DateValidator;
pub use length::StringValidator;
pub use numeric::{IntegerValidator, NumberValidator};
pub use pattern::PatternValidator;
pub use required::RequiredValidator;
