use std::fmt;

/// Error returned by a lifecycle observer.
///
/// `Validation` and `PropagationStopped` decline the operation (the save
/// method answers `false`/`None`); `Observer` is a genuine failure and is
/// propagated to the caller.
#[derive(Debug, Clone)]
pub enum EventError {
    Validation {
        attribute: String,
        message: String,
    },
    Observer {
        message: String,
    },
    PropagationStopped {
        reason: String,
    },
}

impl EventError {
    pub fn validation(attribute: &str, message: &str) -> Self {
        Self::Validation {
            attribute: attribute.to_string(),
            message: message.to_string(),
        }
    }

    pub fn observer(message: &str) -> Self {
        Self::Observer {
            message: message.to_string(),
        }
    }

    pub fn propagation_stopped(reason: &str) -> Self {
        Self::PropagationStopped {
            reason: reason.to_string(),
        }
    }

    /// Whether the error declines the operation instead of failing it
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            EventError::Validation { .. } | EventError::PropagationStopped { .. }
        )
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Validation { attribute, message } => {
                write!(f, "Validation error on '{}': {}", attribute, message)
            }
            EventError::Observer { message } => write!(f, "Observer error: {}", message),
            EventError::PropagationStopped { reason } => {
                write!(f, "Event propagation stopped: {}", reason)
            }
        }
    }
}

impl std::error::Error for EventError {}
