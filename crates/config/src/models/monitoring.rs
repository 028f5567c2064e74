use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub health_check_interval_seconds: u64,
    /// Pending jobs above this count report the queue as degraded
    pub queue_backlog_warning: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: 60,
            queue_backlog_warning: 100,
        }
    }
}

impl MonitoringConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }
}

impl ConfigValidator for MonitoringConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.health_check_interval_seconds == 0 {
            return Err(crate::ConfigError::Validation(
                "monitoring.health_check_interval_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
