//! # Error Types
//!
//! Input validation errors for reparo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  reparo-core       ValidationError  - Input validation failures         │
//! │  reparo-db         DbError          - Database operation failures       │
//! │  reparo-messaging  MessagingError   - Session, transport, config        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rendering and normalization are total and never return errors; these
//! variants exist for callers that want to reject input up front.

use thiserror::Error;

/// Input validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must have at least {min} digits")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must have at most {max} digits")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "phone".to_string(),
        };
        assert_eq!(err.to_string(), "phone is required");

        let err = ValidationError::TooShort {
            field: "phone".to_string(),
            min: 8,
        };
        assert_eq!(err.to_string(), "phone must have at least 8 digits");
    }
}
