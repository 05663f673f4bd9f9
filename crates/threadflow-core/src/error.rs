//! # Error Types
//!
//! Domain-specific error types for threadflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  threadflow-core errors (this file)                                    │
//! │  ├── CoreError        - Item lifecycle violations                      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  threadflow-sync errors (separate crate)                               │
//! │  └── SyncError        - Health, fetch, transport, config failures      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → status snapshot       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result alias for item lifecycle operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result alias for validation helpers.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Core Error
// =============================================================================

/// Item lifecycle errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A completion record was applied to the wrong item.
    ///
    /// ## When This Occurs
    /// - Caller looked up the wrong entry in its task board
    /// - Server echoed a different identifier than the one submitted
    #[error("Completion for {actual} applied to item {expected}")]
    IdMismatch { expected: String, actual: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used before anything leaves the client (task submission) and when
/// constructing identifiers from user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Priority outside the accepted range.
    #[error("Priority {value} is out of range ({min}-{max})")]
    PriorityOutOfRange { value: i64, min: u8, max: u8 },

    /// Identifier is empty or whitespace.
    #[error("Item identifier cannot be empty")]
    EmptyIdentifier,

    /// Task description is empty or whitespace.
    #[error("Task description cannot be empty")]
    EmptyPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::PriorityOutOfRange {
            value: 11,
            min: 1,
            max: 10,
        };
        assert_eq!(err.to_string(), "Priority 11 is out of range (1-10)");

        let wrapped: CoreError = ValidationError::EmptyPayload.into();
        assert!(wrapped.to_string().contains("Task description"));
    }
}
