//! Validation helpers for inbound frames.

use validator::ValidationError;

/// Longest accepted quiz or user identifier.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validates that a quiz or user identifier is non-blank and of sane length.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("identifier_blank");
        err.message = Some("Identifier must not be blank".into());
        return Err(err);
    }

    if value.len() > MAX_IDENTIFIER_LENGTH {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be at most {MAX_IDENTIFIER_LENGTH} characters (got {})",
                value.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("q1").is_ok());
        assert!(validate_identifier("alice").is_ok());
        assert!(validate_identifier("quiz-math_101").is_ok());
    }

    #[test]
    fn test_validate_identifier_blank() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier("\t\n").is_err());
    }

    #[test]
    fn test_validate_identifier_too_long() {
        let long = "x".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_identifier(&long).is_err());
        let max = "x".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max).is_ok());
    }
}
