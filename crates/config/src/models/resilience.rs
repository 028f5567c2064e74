use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::validation::ConfigValidator;

/// Circuit breaker settings for each protected dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub data_store: CircuitBreakerConfig,
    pub snapshot_storage: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            data_store: CircuitBreakerConfig {
                failure_threshold: 5,
                failure_window: Duration::from_secs(60),
                recovery_timeout: Duration::from_secs(30),
                success_threshold: 1,
                call_timeout: Duration::from_secs(30),
                backoff_multiplier: 2.0,
                max_recovery_timeout: Duration::from_secs(300),
            },
            snapshot_storage: CircuitBreakerConfig {
                failure_threshold: 3,
                failure_window: Duration::from_secs(60),
                recovery_timeout: Duration::from_secs(15),
                success_threshold: 1,
                call_timeout: Duration::from_secs(10),
                backoff_multiplier: 1.5,
                max_recovery_timeout: Duration::from_secs(180),
            },
        }
    }
}

impl ConfigValidator for ResilienceConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.data_store.validate()?;
        self.snapshot_storage.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resilience_config_default() {
        let config = ResilienceConfig::default();

        assert_eq!(config.data_store.failure_threshold, 5);
        assert_eq!(config.data_store.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.snapshot_storage.failure_threshold, 3);
        assert!(config.validate().is_ok());
    }
}
