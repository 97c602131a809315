use crate::error::{AppError, Result};

pub const MAX_COMMENT_LENGTH: usize = 500;
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=10;
pub const CONFIDENCE_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// Validates a skill rating value.
pub fn validate_rating_value(value: i32) -> Result<()> {
    if !RATING_RANGE.contains(&value) {
        return Err(AppError::Validation(format!(
            "ratingValue must be between {} and {}",
            RATING_RANGE.start(),
            RATING_RANGE.end()
        )));
    }
    Ok(())
}

/// Validates a skill rating confidence value.
pub fn validate_confidence(value: i32) -> Result<()> {
    if !CONFIDENCE_RANGE.contains(&value) {
        return Err(AppError::Validation(format!(
            "confidence must be between {} and {}",
            CONFIDENCE_RANGE.start(),
            CONFIDENCE_RANGE.end()
        )));
    }
    Ok(())
}

/// Validates an optional rating comment.
pub fn validate_comment(comment: Option<&str>) -> Result<()> {
    if let Some(comment) = comment {
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppError::Validation(format!(
                "comment must be at most {MAX_COMMENT_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating_value_boundaries() {
        assert!(validate_rating_value(1).is_ok());
        assert!(validate_rating_value(10).is_ok());
        assert!(validate_rating_value(0).is_err());
        assert!(validate_rating_value(11).is_err());
    }

    #[test]
    fn test_validate_confidence_boundaries() {
        assert!(validate_confidence(1).is_ok());
        assert!(validate_confidence(5).is_ok());
        assert!(validate_confidence(0).is_err());
        assert!(validate_confidence(6).is_err());
    }

    #[test]
    fn test_validate_comment_length() {
        assert!(validate_comment(None).is_ok());
        assert!(validate_comment(Some(&"a".repeat(500))).is_ok());
        assert!(validate_comment(Some(&"a".repeat(501))).is_err());
    }
}
