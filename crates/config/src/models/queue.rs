use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 计算队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 最大并发计算数
    pub max_workers: usize,
    /// 最大待处理任务数
    pub max_queue_size: usize,
    /// 首次执行之外的最大重试次数
    pub max_retries: u32,
    /// 单次执行超时（毫秒）
    pub job_timeout_ms: u64,
    /// 重试基础间隔（毫秒）
    pub retry_base_delay_ms: u64,
    /// 重试最大间隔（毫秒）
    pub retry_max_delay_ms: u64,
    /// 计算前是否先创建快照
    pub snapshot_before_calculation: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_queue_size: 1000,
            max_retries: 3,
            job_timeout_ms: 30_000,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            snapshot_before_calculation: false,
        }
    }
}

impl QueueConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

impl ConfigValidator for QueueConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.max_workers == 0 || self.max_workers > 64 {
            return Err(crate::ConfigError::Validation(
                "queue.max_workers must be between 1 and 64".to_string(),
            ));
        }
        ValidationUtils::validate_count(self.max_queue_size, "queue.max_queue_size")?;
        if self.max_retries > 20 {
            return Err(crate::ConfigError::Validation(
                "queue.max_retries must be less than or equal to 20".to_string(),
            ));
        }
        ValidationUtils::validate_millis(self.job_timeout_ms, 3_600_000, "queue.job_timeout_ms")?;
        ValidationUtils::validate_millis(
            self.retry_base_delay_ms,
            3_600_000,
            "queue.retry_base_delay_ms",
        )?;
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(crate::ConfigError::Validation(
                "queue.retry_max_delay_ms must be greater than or equal to retry_base_delay_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
