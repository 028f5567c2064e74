use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a count is reasonable
    pub fn validate_count(count: usize, field_name: &str) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > 10000 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 10000"
            )));
        }
        Ok(())
    }

    /// Validate a millisecond duration against an inclusive upper bound
    pub fn validate_millis(value_ms: u64, max_ms: u64, field_name: &str) -> ConfigResult<()> {
        if value_ms == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if value_ms > max_ms {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be less than or equal to {max_ms}"
            )));
        }
        Ok(())
    }

    /// Validate a log level name
    pub fn validate_log_level(level: &str) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "invalid log level: {level}, supported: {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("test", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("  test  ", "field").is_ok());
        assert!(ValidationUtils::validate_not_empty("", "field").is_err());
        assert!(ValidationUtils::validate_not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_validate_count() {
        assert!(ValidationUtils::validate_count(10, "test").is_ok());
        assert!(ValidationUtils::validate_count(10000, "test").is_ok());
        assert!(ValidationUtils::validate_count(0, "test").is_err());
        assert!(ValidationUtils::validate_count(10001, "test").is_err());
    }

    #[test]
    fn test_validate_millis() {
        assert!(ValidationUtils::validate_millis(500, 1000, "t").is_ok());
        assert!(ValidationUtils::validate_millis(1000, 1000, "t").is_ok());
        assert!(ValidationUtils::validate_millis(0, 1000, "t").is_err());
        assert!(ValidationUtils::validate_millis(1001, 1000, "t").is_err());
    }

    #[test]
    fn test_validate_log_level() {
        assert!(ValidationUtils::validate_log_level("info").is_ok());
        assert!(ValidationUtils::validate_log_level("WARN").is_ok());
        assert!(ValidationUtils::validate_log_level("verbose").is_err());
    }
}
