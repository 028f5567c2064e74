use std::time::Duration;

use standings_config::QueueConfig;

/// 重试退避策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 退避上限
    pub max_delay: Duration,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
            ..Self::default()
        }
    }

    /// 不带抖动的策略，测试中用于得到确定的等待时间
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// 第 `attempts` 次执行失败后的等待时间：`base * multiplier^(attempts-1)`，不超过上限
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(63) as i32;

        let capped = (base * self.backoff_multiplier.powi(exponent)).min(max);

        // 抖动避免同时失败的任务在同一时刻重试
        let jitter = if self.jitter_factor > 0.0 {
            capped * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0
        } else {
            0.0
        };
        let delay = (capped + jitter).clamp(base.min(max), max);

        Duration::from_secs_f64(delay)
    }
}
