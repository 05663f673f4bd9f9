//! # Validation
//!
//! Input checks applied before a task is submitted or an identifier is
//! accepted from user input. Server responses are NOT validated here; the
//! sync engines trust the server for everything except JSON shape.

use crate::error::{ValidationError, ValidationResult};
use crate::types::Priority;
use crate::{MAX_PRIORITY, MIN_PRIORITY};

/// Validates a task priority (inclusive 1..=10).
pub fn validate_priority(value: i64) -> ValidationResult<Priority> {
    if value < i64::from(MIN_PRIORITY) || value > i64::from(MAX_PRIORITY) {
        return Err(ValidationError::PriorityOutOfRange {
            value,
            min: MIN_PRIORITY,
            max: MAX_PRIORITY,
        });
    }
    // Range check above guarantees the cast is lossless.
    Ok(Priority::from_validated(value as u8))
}

/// Validates an item identifier typed by a user.
pub fn validate_item_id(raw: &str) -> ValidationResult<()> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    Ok(())
}

/// Validates a task description and returns it trimmed.
pub fn validate_payload(raw: &str) -> ValidationResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_priority() {
        for p in 1..=10 {
            assert_eq!(validate_priority(p).unwrap().value() as i64, p);
        }
        assert!(matches!(
            validate_priority(0),
            Err(ValidationError::PriorityOutOfRange { value: 0, .. })
        ));
        assert!(validate_priority(-3).is_err());
        assert!(validate_priority(256).is_err());
    }

    #[test]
    fn test_validate_item_id() {
        assert!(validate_item_id("task_1_2").is_ok());
        assert_eq!(validate_item_id(""), Err(ValidationError::EmptyIdentifier));
        assert_eq!(validate_item_id("\t"), Err(ValidationError::EmptyIdentifier));
    }

    #[test]
    fn test_validate_payload() {
        assert_eq!(validate_payload("  resize image ").unwrap(), "resize image");
        assert_eq!(validate_payload("   "), Err(ValidationError::EmptyPayload));
    }
}
