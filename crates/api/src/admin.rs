use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use standings_application::{RestoreOutcome, SnapshotService, TableCalculationEngine};
use standings_config::{CircuitState, MonitoringConfig};
use standings_dispatcher::{JobRequest, QueueManager, QueueStatus};
use standings_domain::{
    AutomationSettings, CalculationJob, JobId, JobPriority, JobTrigger, LeagueRepository,
    SettingsUpdate, SnapshotStorage, SnapshotSummary, StandingsStore,
};
use standings_errors::{StandingsError, StandingsResult};
use standings_infrastructure::{CircuitBreakerStatus, DATA_STORE, SNAPSHOT_STORAGE};

/// 尚无处理记录时的单任务预估耗时
const DEFAULT_JOB_DURATION: Duration = Duration::from_secs(2);

/// 手动触发重算的请求体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub saison_id: Option<i64>,
    pub priority: Option<JobPriority>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    pub job_id: JobId,
    pub liga_id: i64,
    pub saison_id: i64,
    pub priority: JobPriority,
    /// 预计完成时间（毫秒）
    pub estimated_duration: u64,
    pub jobs_ahead: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub saison_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSnapshot {
    pub snapshot_id: String,
    pub liga_id: i64,
    pub saison_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationState {
    pub running: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerStatus>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            message: None,
            circuit_breaker: None,
        }
    }

    fn with_status(mut self, status: HealthState, message: impl Into<String>) -> Self {
        if status > self.status {
            self.status = status;
            self.message = Some(message.into());
        }
        self
    }

    fn with_breaker(mut self, breaker: Option<CircuitBreakerStatus>) -> Self {
        if let Some(breaker) = breaker {
            self = match breaker.state {
                CircuitState::Open => self.with_status(HealthState::Degraded, "熔断器已打开"),
                CircuitState::HalfOpen => self.with_status(HealthState::Degraded, "熔断器半开"),
                CircuitState::Closed => self,
            };
            self.circuit_breaker = Some(breaker);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    pub queue: ComponentHealth,
    pub data_store: ComponentHealth,
    pub snapshot_storage: ComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub status: HealthState,
    pub components: HealthComponents,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// 管理操作：手动触发、队列控制、快照与设置
pub struct AdminService {
    queue: QueueManager,
    engine: Arc<TableCalculationEngine>,
    snapshots: Arc<SnapshotService>,
    leagues: Arc<dyn LeagueRepository>,
    store: Arc<dyn StandingsStore>,
    snapshot_storage: Arc<dyn SnapshotStorage>,
    monitoring: MonitoringConfig,
    started_at: Instant,
}

impl AdminService {
    pub fn new(
        queue: QueueManager,
        engine: Arc<TableCalculationEngine>,
        snapshots: Arc<SnapshotService>,
        leagues: Arc<dyn LeagueRepository>,
        store: Arc<dyn StandingsStore>,
        snapshot_storage: Arc<dyn SnapshotStorage>,
        monitoring: MonitoringConfig,
    ) -> Self {
        Self {
            queue,
            engine,
            snapshots,
            leagues,
            store,
            snapshot_storage,
            monitoring,
            started_at: Instant::now(),
        }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// 手动触发重算，默认高优先级和联赛当前赛季
    pub async fn trigger_recalculation(
        &self,
        liga_id: i64,
        request: TriggerRequest,
    ) -> StandingsResult<TriggerResult> {
        let scope = self.engine.resolve_scope(liga_id, request.saison_id).await?;
        let priority = request.priority.unwrap_or(JobPriority::High);

        let mut job = JobRequest::new(scope.liga_id, scope.saison_id)
            .priority(priority)
            .trigger(JobTrigger::Manual);
        if let Some(description) = request.description {
            job = job.description(description);
        }
        let job_id = self.queue.enqueue(job).await?;

        let jobs_ahead = self.queue.jobs_ahead(job_id).await;
        let average = self
            .queue
            .average_processing_time()
            .await
            .unwrap_or(DEFAULT_JOB_DURATION);
        let workers = self.queue.settings().await.max_workers.max(1);
        let estimated = average.mul_f64(jobs_ahead as f64 / workers as f64) + average;

        info!(
            job_id = %job_id,
            liga_id = scope.liga_id,
            saison_id = scope.saison_id,
            %priority,
            jobs_ahead,
            "manual recalculation triggered"
        );
        Ok(TriggerResult {
            job_id,
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
            priority,
            estimated_duration: estimated.as_millis() as u64,
            jobs_ahead,
        })
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.get_queue_status().await
    }

    /// 队列、数据存储和快照存储的健康状况，整体状态取最差的组件
    pub async fn system_health(&self) -> SystemHealth {
        let status = self.queue.get_queue_status().await;
        let breaker = |name: &str| {
            status
                .circuit_breakers
                .iter()
                .find(|breaker| breaker.name == name)
                .cloned()
        };

        let mut queue = ComponentHealth::healthy();
        if !status.running {
            queue = queue.with_status(HealthState::Unhealthy, "队列未运行");
        } else if status.paused {
            queue = queue.with_status(HealthState::Degraded, "自动计算已暂停");
        }
        let backlog = status.pending + status.waiting_retry;
        if backlog >= self.monitoring.queue_backlog_warning {
            queue = queue.with_status(
                HealthState::Degraded,
                format!("待处理任务积压: {backlog}"),
            );
        }

        let mut data_store = ComponentHealth::healthy().with_breaker(breaker(DATA_STORE));
        if let Err(e) = self.store.ping().await {
            warn!(error = %e, "data store health check failed");
            data_store = data_store.with_status(HealthState::Unhealthy, e.to_string());
        }

        let mut snapshot_storage =
            ComponentHealth::healthy().with_breaker(breaker(SNAPSHOT_STORAGE));
        if let Err(e) = self.snapshot_storage.ping().await {
            warn!(error = %e, "snapshot storage health check failed");
            snapshot_storage = snapshot_storage.with_status(HealthState::Unhealthy, e.to_string());
        }

        let overall = queue
            .status
            .max(data_store.status)
            .max(snapshot_storage.status);

        SystemHealth {
            status: overall,
            components: HealthComponents {
                queue,
                data_store,
                snapshot_storage,
            },
            uptime_seconds: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }

    /// 联赛的计算历史，最新的在前
    pub async fn calculation_history(
        &self,
        liga_id: i64,
        limit: Option<usize>,
    ) -> StandingsResult<Vec<CalculationJob>> {
        self.ensure_liga(liga_id).await?;
        let mut jobs = self.queue.list_jobs(Some(liga_id)).await;
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    pub async fn pause_automation(&self) -> AutomationState {
        self.queue.pause_queue().await;
        self.automation_state().await
    }

    pub async fn resume_automation(&self) -> AutomationState {
        self.queue.resume_queue().await;
        self.automation_state().await
    }

    async fn automation_state(&self) -> AutomationState {
        AutomationState {
            running: self.queue.is_running().await,
            paused: self.queue.is_paused().await,
        }
    }

    pub async fn get_settings(&self) -> AutomationSettings {
        self.queue.settings().await
    }

    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> StandingsResult<AutomationSettings> {
        self.queue.update_settings(update).await
    }

    pub async fn list_snapshots(
        &self,
        liga_id: i64,
        saison_id: Option<i64>,
    ) -> StandingsResult<Vec<SnapshotSummary>> {
        self.ensure_liga(liga_id).await?;
        self.snapshots.list_snapshots(Some(liga_id), saison_id).await
    }

    pub async fn create_snapshot(
        &self,
        liga_id: i64,
        request: CreateSnapshotRequest,
    ) -> StandingsResult<CreatedSnapshot> {
        let scope = self.engine.resolve_scope(liga_id, request.saison_id).await?;
        let description = request
            .description
            .unwrap_or_else(|| "manual snapshot".to_string());
        let snapshot_id = self
            .snapshots
            .create_snapshot(scope.liga_id, scope.saison_id, &description)
            .await?;
        Ok(CreatedSnapshot {
            snapshot_id,
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
        })
    }

    /// 回滚到快照
    pub async fn restore_snapshot(&self, snapshot_id: &str) -> StandingsResult<RestoreOutcome> {
        let outcome = self.snapshots.restore_snapshot(snapshot_id).await?;
        info!(
            snapshot_id,
            liga_id = outcome.liga_id,
            saison_id = outcome.saison_id,
            rows = outcome.rows_restored,
            "standings rolled back to snapshot"
        );
        Ok(outcome)
    }

    pub async fn cancel_job(&self, job_id: JobId) -> StandingsResult<CalculationJob> {
        self.queue.cancel_job(job_id).await
    }

    pub async fn retry_job(&self, job_id: JobId) -> StandingsResult<CalculationJob> {
        self.queue.retry_job(job_id).await
    }

    async fn ensure_liga(&self, liga_id: i64) -> StandingsResult<()> {
        standings_domain::validate_liga_id(liga_id)?;
        match self.leagues.find_liga(liga_id).await? {
            Some(_) => Ok(()),
            None => Err(StandingsError::liga_not_found(liga_id)),
        }
    }
}
