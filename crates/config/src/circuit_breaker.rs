use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-dependency circuit breaker settings. Durations are written in
/// milliseconds in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (inside `failure_window`) before the breaker opens
    pub failure_threshold: usize,
    #[serde(rename = "failure_window_ms", with = "duration_ms_serde")]
    pub failure_window: Duration,
    /// Cooldown before the half-open probe
    #[serde(rename = "recovery_timeout_ms", with = "duration_ms_serde")]
    pub recovery_timeout: Duration,
    /// Successful probes needed to close again
    pub success_threshold: usize,
    #[serde(rename = "call_timeout_ms", with = "duration_ms_serde")]
    pub call_timeout: Duration,
    pub backoff_multiplier: f64,
    #[serde(rename = "max_recovery_timeout_ms", with = "duration_ms_serde")]
    pub max_recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
            call_timeout: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_recovery_timeout: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::Validation(
                "success_threshold must be greater than 0".to_string(),
            ));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "backoff_multiplier must be greater than or equal to 1.0".to_string(),
            ));
        }

        if self.failure_window.is_zero() {
            return Err(ConfigError::Validation(
                "failure_window must be greater than 0".to_string(),
            ));
        }

        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "recovery_timeout must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "call_timeout must be greater than 0".to_string(),
            ));
        }

        if self.recovery_timeout > self.max_recovery_timeout {
            return Err(ConfigError::Validation(
                "recovery_timeout must be less than or equal to max_recovery_timeout".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.success_threshold, 1);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_recovery_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_circuit_breaker_config_validation() {
        let config = CircuitBreakerConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.failure_threshold = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.success_threshold = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.backoff_multiplier = 0.5;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.recovery_timeout = Duration::from_secs(0);
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.recovery_timeout = Duration::from_secs(400);
        invalid_config.max_recovery_timeout = Duration::from_secs(300);
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_durations_are_written_in_millis() {
        let config = CircuitBreakerConfig {
            recovery_timeout: Duration::from_millis(1500),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["recovery_timeout_ms"], 1500);

        let back: CircuitBreakerConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back.recovery_timeout, Duration::from_millis(1500));
    }
}
