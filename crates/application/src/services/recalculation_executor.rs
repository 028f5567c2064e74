use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use standings_domain::{AutomationSettings, CalculationExecutor, CalculationJob, CalculationOutcome};
use standings_errors::StandingsResult;
use standings_infrastructure::CircuitBreaker;

use super::calculation_engine::TableCalculationEngine;
use super::snapshot_service::SnapshotService;

/// 队列任务执行器：可选地先保存快照，再重算积分榜
///
/// 只有重算经过数据存储熔断器；快照由快照存储自己的熔断器保护。
pub struct RecalculationExecutor {
    engine: Arc<TableCalculationEngine>,
    snapshots: Arc<SnapshotService>,
    data_store: Arc<CircuitBreaker>,
    snapshot_before_calculation: AtomicBool,
}

impl RecalculationExecutor {
    pub fn new(
        engine: Arc<TableCalculationEngine>,
        snapshots: Arc<SnapshotService>,
        data_store: Arc<CircuitBreaker>,
        snapshot_before_calculation: bool,
    ) -> Self {
        Self {
            engine,
            snapshots,
            data_store,
            snapshot_before_calculation: AtomicBool::new(snapshot_before_calculation),
        }
    }

    pub fn snapshot_before_calculation(&self) -> bool {
        self.snapshot_before_calculation.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CalculationExecutor for RecalculationExecutor {
    async fn execute(
        &self,
        job: &CalculationJob,
        cancel: CancellationToken,
    ) -> StandingsResult<CalculationOutcome> {
        let snapshot_id = if self.snapshot_before_calculation() {
            let id = self
                .snapshots
                .create_snapshot(
                    job.liga_id,
                    job.saison_id,
                    &format!("pre-calculation job {}", job.id),
                )
                .await?;
            debug!(job_id = %job.id, snapshot_id = %id, "pre-calculation snapshot saved");
            Some(id)
        } else {
            None
        };

        // 队列已按任务超时约束本次执行
        let rows = self
            .data_store
            .execute_untimed(|| {
                self.engine
                    .calculate(job.liga_id, job.saison_id, &cancel, job.id)
            })
            .await?;

        Ok(CalculationOutcome {
            rows_updated: rows.len(),
            snapshot_id,
        })
    }

    fn apply_settings(&self, settings: &AutomationSettings) {
        self.snapshot_before_calculation
            .store(settings.snapshot_before_calculation, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use standings_config::{CircuitBreakerConfig, CircuitState, SnapshotConfig};
    use standings_domain::{JobPriority, ScopeKey};
    use standings_errors::StandingsError;
    use standings_infrastructure::{FileSnapshotStorage, DATA_STORE};
    use standings_testing_utils::{FlakyStandingsStore, LeagueFixture};

    fn breaker(threshold: usize) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::with_config(
            DATA_STORE,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: std::time::Duration::from_secs(60),
                ..CircuitBreakerConfig::default()
            },
        ))
    }

    async fn executor(snapshot_first: bool, dir: &std::path::Path) -> RecalculationExecutor {
        let store = Arc::new(LeagueFixture::bundesliga().seed().await);
        let engine = Arc::new(TableCalculationEngine::new(store.clone(), store.clone()));
        let snapshots = Arc::new(SnapshotService::new(
            store,
            Arc::new(FileSnapshotStorage::new(dir)),
            SnapshotConfig::default(),
        ));
        RecalculationExecutor::new(engine, snapshots, breaker(5), snapshot_first)
    }

    fn job() -> CalculationJob {
        CalculationJob::new(ScopeKey::new(1, 2024).unwrap(), JobPriority::High, 3)
    }

    #[tokio::test]
    async fn test_execute_recalculates() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(false, dir.path()).await;
        let outcome = executor.execute(&job(), CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.rows_updated, 4);
        assert!(outcome.snapshot_id.is_none());
    }

    #[tokio::test]
    async fn test_settings_enable_pre_calculation_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(false, dir.path()).await;
        executor.apply_settings(&AutomationSettings {
            enabled: true,
            max_workers: 3,
            max_retries: 3,
            job_timeout_ms: 30_000,
            default_priority: JobPriority::Normal,
            snapshot_before_calculation: true,
        });

        let outcome = executor.execute(&job(), CancellationToken::new()).await.unwrap();
        let snapshot_id = outcome.snapshot_id.unwrap();
        assert!(snapshot_id.starts_with("snapshot_1_2024_"));
        assert!(dir.path().join(format!("{snapshot_id}.json")).exists());
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_trip_data_store_breaker() {
        let dir = tempfile::tempdir().unwrap();
        // 快照目录是一个普通文件，保存必然失败
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let store = Arc::new(LeagueFixture::bundesliga().seed().await);
        let engine = Arc::new(TableCalculationEngine::new(store.clone(), store.clone()));
        let snapshots = Arc::new(SnapshotService::new(
            store,
            Arc::new(FileSnapshotStorage::new(&blocked)),
            SnapshotConfig::default(),
        ));
        let data_store = breaker(1);
        let executor = RecalculationExecutor::new(engine, snapshots, data_store.clone(), true);

        for _ in 0..3 {
            let result = executor.execute(&job(), CancellationToken::new()).await;
            assert!(matches!(result, Err(StandingsError::Snapshot(_))));
        }
        assert_eq!(data_store.get_state().await, CircuitState::Closed);
        assert_eq!(data_store.get_stats().await.total_calls, 0);
    }

    #[tokio::test]
    async fn test_store_failures_open_data_store_breaker() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeagueFixture::bundesliga().seed().await;
        let flaky = Arc::new(FlakyStandingsStore::new(store.clone()));
        flaky.fail_next_begins(2);
        let engine = Arc::new(TableCalculationEngine::new(flaky, Arc::new(store.clone())));
        let snapshots = Arc::new(SnapshotService::new(
            Arc::new(store),
            Arc::new(FileSnapshotStorage::new(dir.path())),
            SnapshotConfig::default(),
        ));
        let data_store = breaker(2);
        let executor = RecalculationExecutor::new(engine, snapshots, data_store.clone(), false);

        for _ in 0..2 {
            let result = executor.execute(&job(), CancellationToken::new()).await;
            assert!(matches!(result, Err(StandingsError::Transient(_))));
        }
        assert_eq!(data_store.get_state().await, CircuitState::Open);

        // 存储已恢复，但熔断期间不会被访问
        let result = executor.execute(&job(), CancellationToken::new()).await;
        assert!(matches!(result, Err(StandingsError::CircuitOpen { .. })));
    }
}
