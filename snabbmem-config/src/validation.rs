//! Custom validation functions shared across configuration modules.

use validator::ValidationError;

/// Validate a tracing filter level keyword.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_pass() {
        for level in ["trace", "debug", "info", "warn", "error", "WARN"] {
            assert!(validate_log_level(level).is_ok());
        }
    }

    #[test]
    fn unknown_level_fails() {
        assert!(validate_log_level("loud").is_err());
    }
}
