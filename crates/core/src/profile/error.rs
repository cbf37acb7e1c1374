//! Error types for the profile module.

use thiserror::Error;

/// Errors raised when a profile fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    /// A required text field is empty.
    #[error("Profile field '{field}' must not be empty")]
    Empty { field: &'static str },

    /// Width or height out of range.
    #[error("Invalid output dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A numeric field is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ProfileError {
    /// Creates a new invalid value error.
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
