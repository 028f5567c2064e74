//! Circuit breaker implementation for resilience
//!
//! One breaker guards one dependency (data store, snapshot storage). Only
//! errors that indicate the dependency itself is unhealthy count as failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use standings_config::{CircuitBreakerConfig, CircuitState, ResilienceConfig};
use standings_errors::{StandingsError, StandingsResult};

pub const DATA_STORE: &str = "data_store";
pub const SNAPSHOT_STORAGE: &str = "snapshot_storage";

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub last_state_change: Instant,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub current_recovery_timeout: Duration,
    first_failure_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

impl CircuitBreakerStats {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            last_state_change: Instant::now(),
            last_failure_time: None,
            current_recovery_timeout: config.recovery_timeout,
            first_failure_at: None,
            probe_started_at: None,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64
        }
    }
}

/// Serializable view used by status and health endpoints
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub threshold: usize,
    pub cooldown_ms: u64,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
}

enum Outcome {
    Success,
    Failure,
    Released,
}

/// Circuit breaker implementation
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    stats: Arc<RwLock<CircuitBreakerStats>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let stats = CircuitBreakerStats::new(&config);
        Self {
            name: name.into(),
            config,
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` through the breaker.
    ///
    /// Short-circuits with `CircuitOpen` while open. Each call is bounded by
    /// `call_timeout`; a timeout counts as a failure.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> StandingsResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = StandingsResult<T>>,
    {
        self.run(Some(self.config.call_timeout), operation).await
    }

    /// Like [`execute`](Self::execute) but without `call_timeout`.
    ///
    /// For callers that already bound the operation themselves.
    pub async fn execute_untimed<F, Fut, T>(&self, operation: F) -> StandingsResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = StandingsResult<T>>,
    {
        self.run(None, operation).await
    }

    async fn run<F, Fut, T>(&self, limit: Option<Duration>, operation: F) -> StandingsResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = StandingsResult<T>>,
    {
        self.acquire().await?;

        let result = match limit {
            Some(limit) => tokio::time::timeout(limit, operation()).await,
            None => Ok(operation().await),
        };

        match result {
            Ok(Ok(value)) => {
                self.record(Outcome::Success).await;
                Ok(value)
            }
            Ok(Err(error)) => {
                let outcome = if error.counts_as_dependency_failure() {
                    Outcome::Failure
                } else if matches!(error, StandingsError::Cancelled { .. }) {
                    Outcome::Released
                } else {
                    // 依赖已正常响应
                    Outcome::Success
                };
                self.record(outcome).await;
                Err(error)
            }
            Err(_) => {
                self.record(Outcome::Failure).await;
                Err(StandingsError::Timeout(format!(
                    "{} call exceeded {}ms",
                    self.name,
                    limit.unwrap_or_default().as_millis()
                )))
            }
        }
    }

    async fn acquire(&self) -> StandingsResult<()> {
        let mut stats = self.stats.write().await;
        let now = Instant::now();

        match stats.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if now.duration_since(stats.last_state_change) >= stats.current_recovery_timeout {
                    stats.state = CircuitState::HalfOpen;
                    stats.last_state_change = now;
                    stats.consecutive_successes = 0;
                    stats.probe_started_at = Some(now);
                    info!(breaker = %self.name, "circuit breaker half-open, probing dependency");
                    Ok(())
                } else {
                    stats.rejected_calls += 1;
                    Err(StandingsError::circuit_open(&self.name))
                }
            }
            CircuitState::HalfOpen => {
                // 同一时间只放行一个探测请求，探测超时后允许新的探测
                let probe_busy = stats
                    .probe_started_at
                    .is_some_and(|started| now.duration_since(started) < self.config.call_timeout);
                if probe_busy {
                    stats.rejected_calls += 1;
                    Err(StandingsError::circuit_open(&self.name))
                } else {
                    stats.probe_started_at = Some(now);
                    Ok(())
                }
            }
        }
    }

    async fn record(&self, outcome: Outcome) {
        let mut stats = self.stats.write().await;
        let now = Instant::now();
        stats.probe_started_at = None;

        match outcome {
            Outcome::Released => {}
            Outcome::Success => {
                stats.total_calls += 1;
                stats.successful_calls += 1;
                stats.consecutive_successes += 1;
                stats.consecutive_failures = 0;
                stats.first_failure_at = None;

                if stats.state == CircuitState::HalfOpen
                    && stats.consecutive_successes >= self.config.success_threshold
                {
                    stats.state = CircuitState::Closed;
                    stats.last_state_change = now;
                    stats.current_recovery_timeout = self.config.recovery_timeout;
                    info!(breaker = %self.name, "circuit breaker closed");
                }
            }
            Outcome::Failure => {
                stats.total_calls += 1;
                stats.failed_calls += 1;
                stats.consecutive_successes = 0;
                stats.last_failure_time = Some(Utc::now());

                let window_expired = stats
                    .first_failure_at
                    .is_some_and(|first| now.duration_since(first) > self.config.failure_window);
                if stats.first_failure_at.is_none() || window_expired {
                    stats.first_failure_at = Some(now);
                    stats.consecutive_failures = 0;
                }
                stats.consecutive_failures += 1;

                match stats.state {
                    CircuitState::Closed
                        if stats.consecutive_failures >= self.config.failure_threshold =>
                    {
                        stats.state = CircuitState::Open;
                        stats.last_state_change = now;
                        stats.current_recovery_timeout = self.config.recovery_timeout;
                        warn!(
                            breaker = %self.name,
                            failures = stats.consecutive_failures,
                            "circuit breaker opened"
                        );
                        metrics::counter!("standings_circuit_breaker_opened_total", "breaker" => self.name.clone())
                            .increment(1);
                    }
                    CircuitState::HalfOpen => {
                        stats.state = CircuitState::Open;
                        stats.last_state_change = now;
                        stats.current_recovery_timeout = std::cmp::min(
                            Duration::from_millis(
                                (stats.current_recovery_timeout.as_millis() as f64
                                    * self.config.backoff_multiplier)
                                    as u64,
                            ),
                            self.config.max_recovery_timeout,
                        );
                        warn!(
                            breaker = %self.name,
                            cooldown_ms = stats.current_recovery_timeout.as_millis() as u64,
                            "probe failed, circuit breaker reopened"
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.stats.read().await.state
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        self.stats.read().await.clone()
    }

    pub async fn status(&self) -> CircuitBreakerStatus {
        let stats = self.stats.read().await;
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: stats.state,
            failure_count: stats.consecutive_failures,
            last_failure_time: stats.last_failure_time,
            threshold: self.config.failure_threshold,
            cooldown_ms: stats.current_recovery_timeout.as_millis() as u64,
            total_calls: stats.total_calls,
            failed_calls: stats.failed_calls,
            rejected_calls: stats.rejected_calls,
        }
    }

    pub async fn reset(&self) {
        let mut stats = self.stats.write().await;
        *stats = CircuitBreakerStats::new(&self.config);
    }

    pub async fn force_open(&self) {
        let mut stats = self.stats.write().await;
        stats.state = CircuitState::Open;
        stats.last_state_change = Instant::now();
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// The breakers of all protected dependencies, shared by the services that call them
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    data_store: Arc<CircuitBreaker>,
    snapshot_storage: Arc<CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            data_store: Arc::new(CircuitBreaker::with_config(
                DATA_STORE,
                config.data_store.clone(),
            )),
            snapshot_storage: Arc::new(CircuitBreaker::with_config(
                SNAPSHOT_STORAGE,
                config.snapshot_storage.clone(),
            )),
        }
    }

    pub fn data_store(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.data_store)
    }

    pub fn snapshot_storage(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.snapshot_storage)
    }

    pub async fn statuses(&self) -> Vec<CircuitBreakerStatus> {
        vec![
            self.data_store.status().await,
            self.snapshot_storage.status().await,
        ]
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(&ResilienceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: usize, recovery_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: Duration::from_millis(recovery_ms),
            max_recovery_timeout: Duration::from_millis(recovery_ms * 10),
            ..Default::default()
        }
    }

    async fn fail(cb: &CircuitBreaker) -> StandingsResult<()> {
        cb.execute(|| async { Err(StandingsError::transient("connection reset")) })
            .await
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_state() {
        let cb = CircuitBreaker::new(DATA_STORE);
        assert_eq!(cb.get_state().await, CircuitState::Closed);

        let result = cb.execute(|| async { Ok::<_, StandingsError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_six_failures_open_and_seventh_short_circuits() {
        let cb = CircuitBreaker::with_config(DATA_STORE, config(6, 60_000));

        for _ in 0..6 {
            assert!(matches!(fail(&cb).await, Err(StandingsError::Transient(_))));
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        let mut invoked = false;
        let result = cb
            .execute(|| {
                invoked = true;
                async { Ok::<(), StandingsError>(()) }
            })
            .await;
        assert!(matches!(result, Err(StandingsError::CircuitOpen { .. })));
        assert!(!invoked);
        assert_eq!(cb.get_stats().await.rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_breaker() {
        let cb = CircuitBreaker::with_config(DATA_STORE, config(2, 60_000));
        for _ in 0..5 {
            let result: StandingsResult<()> = cb
                .execute(|| async { Err(StandingsError::liga_not_found(1)) })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_success_closes() {
        let cb = CircuitBreaker::with_config(DATA_STORE, config(2, 50));
        for _ in 0..2 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let result = cb.execute(|| async { Ok::<(), StandingsError>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens_with_longer_cooldown() {
        let cb = CircuitBreaker::with_config(DATA_STORE, config(1, 50));
        let _ = fail(&cb).await;
        assert_eq!(cb.get_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = fail(&cb).await;

        let stats = cb.get_stats().await;
        assert_eq!(stats.state, CircuitState::Open);
        assert_eq!(stats.current_recovery_timeout, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_half_open_allows_single_probe() {
        let cb = CircuitBreaker::with_config(DATA_STORE, config(1, 20));
        let _ = fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let probe = {
            let cb = cb.clone();
            tokio::spawn(async move {
                cb.execute(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<(), StandingsError>(())
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = cb.execute(|| async { Ok::<(), StandingsError>(()) }).await;
        assert!(matches!(second, Err(StandingsError::CircuitOpen { .. })));

        assert!(probe.await.unwrap().is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_call_timeout_counts_as_failure() {
        let cb = CircuitBreaker::with_config(
            SNAPSHOT_STORAGE,
            CircuitBreakerConfig {
                failure_threshold: 1,
                call_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let result = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<(), StandingsError>(())
            })
            .await;
        assert!(matches!(result, Err(StandingsError::Timeout(_))));
        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_untimed_call_outlives_call_timeout() {
        let cb = CircuitBreaker::with_config(
            DATA_STORE,
            CircuitBreakerConfig {
                failure_threshold: 1,
                call_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let result = cb
            .execute_untimed(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, StandingsError>(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.get_state().await, CircuitState::Closed);

        let failed: StandingsResult<()> = cb
            .execute_untimed(|| async { Err(StandingsError::transient("connection reset")) })
            .await;
        assert!(failed.is_err());
        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_registry_breakers_are_independent() {
        let registry = CircuitBreakerRegistry::default();
        registry.data_store().force_open().await;

        let statuses = registry.statuses().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, DATA_STORE);
        assert_eq!(statuses[0].state, CircuitState::Open);
        assert_eq!(statuses[1].state, CircuitState::Closed);
    }
}
