//! # Error Types
//!
//! Domain-specific error types for relay-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  relay-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  relay-db errors                                                       │
//! │  └── DbError          - Buffer store failures                          │
//! │                                                                         │
//! │  relay-sync errors                                                     │
//! │  └── SyncError        - Validation / StoreUnavailable / Upstream       │
//! │                                                                         │
//! │  relay-server                                                          │
//! │  └── ApiError         - JSON envelope + HTTP status                    │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError → ApiError → 400 envelope           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown invoice layout name in configuration.
    #[error("Unknown invoice layout: '{0}'")]
    UnknownLayout(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access, so a rejected request never mutates state.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Too many entries in a list field.
    #[error("{field} accepts at most {max} entries, got {actual}")]
    TooMany {
        field: String,
        max: usize,
        actual: usize,
    },

    /// Invalid format (e.g. blank identifier, unparsable number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "customer_ids".to_string(),
        };
        assert_eq!(err.to_string(), "customer_ids is required");

        let err = ValidationError::TooMany {
            field: "invoice_numbers".to_string(),
            max: 1000,
            actual: 1001,
        };
        assert_eq!(
            err.to_string(),
            "invoice_numbers accepts at most 1000 entries, got 1001"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "limit".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
