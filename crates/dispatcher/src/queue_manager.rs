use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use standings_config::{CircuitState, QueueConfig};
use standings_domain::{
    AutomationSettings, CalculationExecutor, CalculationJob, CalculationOutcome, JobId,
    JobPriority, JobStatus, JobTrigger, ScopeKey, SettingsUpdate,
};
use standings_errors::{StandingsError, StandingsResult};
use standings_infrastructure::{CircuitBreakerRegistry, CircuitBreakerStatus};

use crate::metrics::{MetricsAggregate, QueueMetrics};
use crate::retry_policy::RetryPolicy;

/// 入队请求
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub liga_id: i64,
    pub saison_id: i64,
    pub priority: JobPriority,
    pub description: Option<String>,
    pub trigger: JobTrigger,
}

impl JobRequest {
    pub fn new(liga_id: i64, saison_id: i64) -> Self {
        Self {
            liga_id,
            saison_id,
            priority: JobPriority::default(),
            description: None,
            trigger: JobTrigger::default(),
        }
    }

    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn trigger(mut self, trigger: JobTrigger) -> Self {
        self.trigger = trigger;
        self
    }
}

/// 队列状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub running: bool,
    pub paused: bool,
    /// 等待执行的任务
    pub pending: usize,
    /// 处于退避等待中的任务
    pub waiting_retry: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_jobs: usize,
    pub max_workers: usize,
    pub max_queue_size: usize,
    pub circuit_breakers: Vec<CircuitBreakerStatus>,
    pub metrics: QueueMetrics,
}

impl QueueStatus {
    /// 是否有熔断器处于非关闭状态
    pub fn has_open_breaker(&self) -> bool {
        self.circuit_breakers
            .iter()
            .any(|breaker| breaker.state != CircuitState::Closed)
    }
}

struct QueueState {
    jobs: HashMap<JobId, CalculationJob>,
    /// (优先级, 入队序号) -> 任务，按键顺序出队
    pending: BTreeMap<(u8, u64), JobId>,
    pending_keys: HashMap<JobId, (u8, u64)>,
    /// 每个作用域最多一个活跃任务
    active_scopes: HashMap<ScopeKey, JobId>,
    tokens: HashMap<JobId, CancellationToken>,
    processing: usize,
    next_seq: u64,
    running: bool,
    paused: bool,
    shutdown: CancellationToken,
    settings: AutomationSettings,
    metrics: MetricsAggregate,
}

impl QueueState {
    fn push_pending(&mut self, job_id: JobId, priority: JobPriority) {
        let key = (priority.rank(), self.next_seq);
        self.next_seq += 1;
        self.pending.insert(key, job_id);
        self.pending_keys.insert(job_id, key);
    }

    fn remove_pending(&mut self, job_id: JobId) {
        if let Some(key) = self.pending_keys.remove(&job_id) {
            self.pending.remove(&key);
        }
    }

    fn release_scope(&mut self, scope: ScopeKey, job_id: JobId) {
        if self.active_scopes.get(&scope) == Some(&job_id) {
            self.active_scopes.remove(&scope);
        }
        self.tokens.remove(&job_id);
    }

    /// 包括退避等待中的任务
    fn pending_count(&self) -> usize {
        self.active_scopes.len().saturating_sub(self.processing)
    }

    fn record_depth(&self) {
        self.metrics.record_depth(self.pending.len(), self.processing);
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    executor: Arc<dyn CalculationExecutor>,
    breakers: CircuitBreakerRegistry,
    retry_policy: RetryPolicy,
    max_queue_size: usize,
    notify: Notify,
    tracker: TaskTracker,
}

/// 积分榜重算队列
///
/// 优先级队列加有界工作池。同一联赛/赛季同时最多一个活跃任务，
/// 失败按错误分类决定退避重试或终止，执行经过数据存储熔断器。
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<QueueInner>,
}

impl QueueManager {
    pub fn new(
        config: &QueueConfig,
        executor: Arc<dyn CalculationExecutor>,
        breakers: CircuitBreakerRegistry,
    ) -> Self {
        Self::with_retry_policy(config, executor, breakers, RetryPolicy::from_config(config))
    }

    pub fn with_retry_policy(
        config: &QueueConfig,
        executor: Arc<dyn CalculationExecutor>,
        breakers: CircuitBreakerRegistry,
        retry_policy: RetryPolicy,
    ) -> Self {
        let settings = AutomationSettings {
            enabled: true,
            max_workers: config.max_workers,
            max_retries: config.max_retries,
            job_timeout_ms: config.job_timeout_ms,
            default_priority: JobPriority::Normal,
            snapshot_before_calculation: config.snapshot_before_calculation,
        };

        let state = QueueState {
            jobs: HashMap::new(),
            pending: BTreeMap::new(),
            pending_keys: HashMap::new(),
            active_scopes: HashMap::new(),
            tokens: HashMap::new(),
            processing: 0,
            next_seq: 0,
            running: false,
            paused: false,
            shutdown: CancellationToken::new(),
            settings,
            metrics: MetricsAggregate::default(),
        };

        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(state),
                executor,
                breakers,
                retry_policy,
                max_queue_size: config.max_queue_size,
                notify: Notify::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// 启动调度循环，重复调用无副作用
    pub async fn start(&self) -> StandingsResult<()> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        if state.running {
            return Ok(());
        }
        state.running = true;
        if state.shutdown.is_cancelled() {
            state.shutdown = CancellationToken::new();
        }

        // 上次关闭时仍在退避等待的任务重新入队
        let stranded: Vec<(JobId, JobPriority)> = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .filter(|job| !state.pending_keys.contains_key(&job.id))
            .map(|job| (job.id, job.priority))
            .collect();
        for (job_id, priority) in stranded {
            state.push_pending(job_id, priority);
        }

        let shutdown = state.shutdown.clone();
        let max_workers = state.settings.max_workers;
        drop(guard);

        self.inner.tracker.reopen();
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(inner.dispatch_loop(shutdown));
        info!(max_workers, "calculation queue started");
        Ok(())
    }

    /// 停止接收任务，协作取消运行中的任务并等待所有工作任务结束
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if !state.running {
                return;
            }
            state.running = false;
            state.shutdown.cancel();
            for job in state.jobs.values() {
                if job.status == JobStatus::Processing {
                    if let Some(token) = state.tokens.get(&job.id) {
                        token.cancel();
                    }
                }
            }
        }

        info!("calculation queue shutting down");
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("calculation queue stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.paused
    }

    /// 添加重算任务，返回任务ID
    ///
    /// 同一作用域已有 PENDING/PROCESSING 任务时直接返回该任务ID。
    pub async fn add_calculation_job(
        &self,
        liga_id: i64,
        saison_id: i64,
        priority: JobPriority,
    ) -> StandingsResult<JobId> {
        self.enqueue(JobRequest::new(liga_id, saison_id).priority(priority))
            .await
    }

    pub async fn enqueue(&self, request: JobRequest) -> StandingsResult<JobId> {
        let scope = ScopeKey::new(request.liga_id, request.saison_id)?;

        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        if !state.running {
            return Err(StandingsError::QueueStopped);
        }

        if let Some(&existing) = state.active_scopes.get(&scope) {
            if let Some(job) = state.jobs.get_mut(&existing) {
                if job.status == JobStatus::Pending && request.priority.is_higher_than(job.priority)
                {
                    debug!(
                        job_id = %existing,
                        from = %job.priority,
                        to = %request.priority,
                        "upgrading pending job priority"
                    );
                    job.priority = request.priority;
                    if let Some(key) = state.pending_keys.get_mut(&existing) {
                        let upgraded = (request.priority.rank(), key.1);
                        state.pending.remove(key);
                        state.pending.insert(upgraded, existing);
                        *key = upgraded;
                    }
                }
            }
            state.metrics.record_deduplicated();
            debug!(job_id = %existing, %scope, "calculation already queued");
            return Ok(existing);
        }

        if state.pending_count() >= self.inner.max_queue_size {
            warn!(%scope, max = self.inner.max_queue_size, "calculation queue full");
            return Err(StandingsError::QueueFull {
                max: self.inner.max_queue_size,
            });
        }

        let job = CalculationJob::new(scope, request.priority, state.settings.max_retries)
            .with_description(request.description)
            .with_trigger(request.trigger);
        let job_id = job.id;

        state.active_scopes.insert(scope, job_id);
        state.tokens.insert(job_id, CancellationToken::new());
        state.jobs.insert(job_id, job);
        state.push_pending(job_id, request.priority);
        state.metrics.record_enqueued();
        state.record_depth();
        drop(guard);

        info!(
            job_id = %job_id,
            liga_id = scope.liga_id,
            saison_id = scope.saison_id,
            priority = %request.priority,
            "calculation job queued"
        );
        self.inner.notify.notify_one();
        Ok(job_id)
    }

    /// 比赛结果变化触发的重算，自动化关闭时返回 `None`
    pub async fn submit_match_result(
        &self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Option<JobId>> {
        let settings = self.settings().await;
        if !settings.enabled {
            debug!(liga_id, saison_id, "automation disabled, ignoring match result");
            return Ok(None);
        }

        let request = JobRequest::new(liga_id, saison_id)
            .priority(settings.default_priority)
            .trigger(JobTrigger::MatchResult);
        self.enqueue(request).await.map(Some)
    }

    /// 取消任务，运行中的任务协作取消
    pub async fn cancel_job(&self, job_id: JobId) -> StandingsResult<CalculationJob> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StandingsError::job_not_found(job_id))?;

        let cancelled = match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                job.next_attempt_at = None;
                let cancelled = job.clone();
                state.remove_pending(job_id);
                if let Some(token) = state.tokens.get(&job_id) {
                    token.cancel();
                }
                state.release_scope(cancelled.scope(), job_id);
                cancelled
            }
            JobStatus::Processing => {
                // 作用域在工作任务结束时释放
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                let cancelled = job.clone();
                if let Some(token) = state.tokens.get(&job_id) {
                    token.cancel();
                }
                cancelled
            }
            status => {
                return Err(StandingsError::InvalidJobState {
                    id: job_id,
                    status: status.to_string(),
                })
            }
        };

        state.metrics.record_cancelled();
        state.record_depth();
        info!(job_id = %job_id, "calculation job cancelled");
        Ok(cancelled)
    }

    /// 将可重试的失败任务重新入队，重置执行次数
    pub async fn retry_job(&self, job_id: JobId) -> StandingsResult<CalculationJob> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        if !state.running {
            return Err(StandingsError::QueueStopped);
        }

        let job = state
            .jobs
            .get(&job_id)
            .ok_or_else(|| StandingsError::job_not_found(job_id))?;
        if job.status != JobStatus::Failed || !job.retryable {
            return Err(StandingsError::InvalidJobState {
                id: job_id,
                status: job.status.to_string(),
            });
        }
        let scope = job.scope();
        if let Some(active) = state.active_scopes.get(&scope) {
            return Err(StandingsError::InvalidJobState {
                id: job_id,
                status: format!("作用域 {scope} 已有活跃任务 {active}"),
            });
        }

        let max_retries = state.settings.max_retries;
        let Some(job) = state.jobs.get_mut(&job_id) else {
            return Err(StandingsError::job_not_found(job_id));
        };
        job.status = JobStatus::Pending;
        job.attempts = 0;
        job.max_retries = max_retries;
        job.error = None;
        job.retryable = false;
        job.started_at = None;
        job.completed_at = None;
        job.next_attempt_at = None;
        job.processing_time_ms = None;
        job.trigger = JobTrigger::Retry;
        let retried = job.clone();

        state.active_scopes.insert(scope, job_id);
        state.tokens.insert(job_id, CancellationToken::new());
        state.push_pending(job_id, retried.priority);
        state.record_depth();
        drop(guard);

        info!(job_id = %job_id, %scope, "failed calculation job requeued");
        self.inner.notify.notify_one();
        Ok(retried)
    }

    /// 暂停出队，已排队的任务保留
    pub async fn pause_queue(&self) {
        self.inner.state.lock().await.paused = true;
        info!("calculation queue paused");
    }

    pub async fn resume_queue(&self) {
        self.inner.state.lock().await.paused = false;
        info!("calculation queue resumed");
        self.inner.notify.notify_one();
    }

    pub async fn get_queue_status(&self) -> QueueStatus {
        let mut status = {
            let state = self.inner.state.lock().await;
            let mut status = QueueStatus {
                running: state.running,
                paused: state.paused,
                pending: 0,
                waiting_retry: 0,
                processing: 0,
                completed: 0,
                failed: 0,
                cancelled: 0,
                total_jobs: state.jobs.len(),
                max_workers: state.settings.max_workers,
                max_queue_size: self.inner.max_queue_size,
                circuit_breakers: Vec::new(),
                metrics: state.metrics.snapshot(),
            };
            for job in state.jobs.values() {
                match job.status {
                    JobStatus::Pending if state.pending_keys.contains_key(&job.id) => {
                        status.pending += 1
                    }
                    JobStatus::Pending => status.waiting_retry += 1,
                    JobStatus::Processing => status.processing += 1,
                    JobStatus::Completed => status.completed += 1,
                    JobStatus::Failed => status.failed += 1,
                    JobStatus::Cancelled => status.cancelled += 1,
                }
            }
            status
        };
        status.circuit_breakers = self.inner.breakers.statuses().await;
        status
    }

    pub async fn get_metrics(&self) -> QueueMetrics {
        self.inner.state.lock().await.metrics.snapshot()
    }

    /// 平均处理时间，尚无结束的任务时为 `None`
    pub async fn average_processing_time(&self) -> Option<Duration> {
        self.inner
            .state
            .lock()
            .await
            .metrics
            .average_processing_time_ms()
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
    }

    /// 排在该任务之前的待执行任务数
    pub async fn jobs_ahead(&self, job_id: JobId) -> usize {
        let state = self.inner.state.lock().await;
        match state.pending_keys.get(&job_id) {
            Some(key) => state.pending.range(..*key).count(),
            None => 0,
        }
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<CalculationJob> {
        self.inner.state.lock().await.jobs.get(&job_id).cloned()
    }

    /// 任务历史，最新的在前
    pub async fn list_jobs(&self, liga_id: Option<i64>) -> Vec<CalculationJob> {
        let state = self.inner.state.lock().await;
        let mut jobs: Vec<CalculationJob> = state
            .jobs
            .values()
            .filter(|job| liga_id.map_or(true, |id| job.liga_id == id))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// 删除已结束的任务，返回删除数量
    pub async fn clear_finished_jobs(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let before = state.jobs.len();
        let QueueState {
            jobs,
            active_scopes,
            tokens,
            ..
        } = &mut *state;
        // 已取消但仍在执行的任务要等执行结束后才能清除
        jobs.retain(|id, job| {
            !job.status.is_finished()
                || tokens.contains_key(id)
                || active_scopes.values().any(|active| active == id)
        });
        let removed = before - state.jobs.len();
        if removed > 0 {
            info!(removed, "finished calculation jobs cleared");
        }
        removed
    }

    pub async fn settings(&self) -> AutomationSettings {
        self.inner.state.lock().await.settings.clone()
    }

    /// 在线修改设置，新的并发数与超时对下一次出队生效
    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> StandingsResult<AutomationSettings> {
        let settings = {
            let mut state = self.inner.state.lock().await;
            let settings = update.apply_to(&state.settings);
            settings.validate()?;
            state.settings = settings.clone();
            settings
        };

        self.inner.executor.apply_settings(&settings);
        info!(
            enabled = settings.enabled,
            max_workers = settings.max_workers,
            max_retries = settings.max_retries,
            job_timeout_ms = settings.job_timeout_ms,
            "automation settings updated"
        );
        self.inner.notify.notify_one();
        Ok(settings)
    }

    pub async fn circuit_breaker_states(&self) -> Vec<CircuitBreakerStatus> {
        self.inner.breakers.statuses().await
    }
}

impl QueueInner {
    async fn dispatch_loop(self: Arc<Self>, shutdown: CancellationToken) {
        debug!("calculation dispatcher loop started");
        loop {
            self.dispatch_ready().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.notify.notified() => {}
            }
        }
        debug!("calculation dispatcher loop stopped");
    }

    /// 在并发上限内按优先级启动待执行任务
    async fn dispatch_ready(self: &Arc<Self>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if !state.running || state.paused {
            return;
        }

        let timeout = Duration::from_millis(state.settings.job_timeout_ms);
        while state.processing < state.settings.max_workers {
            let Some((_, job_id)) = state.pending.pop_first() else {
                break;
            };
            state.pending_keys.remove(&job_id);

            let token = state.tokens.entry(job_id).or_insert_with(CancellationToken::new).clone();
            let Some(job) = state.jobs.get_mut(&job_id) else {
                continue;
            };
            job.status = JobStatus::Processing;
            job.attempts += 1;
            job.started_at = Some(Utc::now());
            job.next_attempt_at = None;
            let job = job.clone();
            state.processing += 1;

            debug!(
                job_id = %job.id,
                liga_id = job.liga_id,
                saison_id = job.saison_id,
                attempt = job.attempts,
                "starting calculation job"
            );
            let inner = Arc::clone(self);
            self.tracker.spawn(inner.run_job(job, token, timeout));
        }
        state.record_depth();
    }

    async fn run_job(self: Arc<Self>, job: CalculationJob, token: CancellationToken, timeout: Duration) {
        let started = Instant::now();
        let job_id = job.id;

        let scope = job.scope();

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, self.executor.execute(&job, token.clone())) => {
                result.unwrap_or_else(|_| {
                    Err(StandingsError::Timeout(format!(
                        "计算任务 {} 超过 {} ms",
                        job_id,
                        timeout.as_millis()
                    )))
                })
            }
            _ = token.cancelled() => Err(StandingsError::Cancelled { id: job_id }),
        };

        self.finish(job_id, scope, result, started.elapsed()).await;
    }

    async fn finish(
        self: &Arc<Self>,
        job_id: JobId,
        scope: ScopeKey,
        result: StandingsResult<CalculationOutcome>,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.processing = state.processing.saturating_sub(1);

        let Some(job) = state.jobs.get_mut(&job_id) else {
            // 任务记录已不存在，作用域仍需释放
            state.release_scope(scope, job_id);
            state.record_depth();
            drop(guard);
            self.notify.notify_one();
            return;
        };
        job.processing_time_ms = Some(elapsed_ms);
        let mut retry_after = None;

        if job.status == JobStatus::Cancelled {
            debug!(job_id = %job_id, "cancelled job finished");
        } else {
            match result {
                Ok(outcome) => {
                    job.status = JobStatus::Completed;
                    job.completed_at = Some(Utc::now());
                    job.error = None;
                    job.retryable = false;
                    state.metrics.record_completed(elapsed_ms);
                    info!(
                        job_id = %job_id,
                        %scope,
                        rows_updated = outcome.rows_updated,
                        elapsed_ms,
                        "calculation job completed"
                    );
                }
                Err(StandingsError::Cancelled { .. }) => {
                    job.status = JobStatus::Cancelled;
                    job.completed_at = Some(Utc::now());
                    state.metrics.record_cancelled();
                    info!(job_id = %job_id, %scope, "calculation job cancelled while running");
                }
                Err(e) if e.is_retryable() && job.has_retries_left() => {
                    let delay = self.retry_policy.delay_for(job.attempts);
                    job.status = JobStatus::Pending;
                    job.error = Some(e.to_string());
                    job.retryable = true;
                    job.next_attempt_at = Some(
                        Utc::now()
                            + chrono::Duration::from_std(delay)
                                .unwrap_or_else(|_| chrono::Duration::zero()),
                    );
                    state.metrics.record_retry();
                    warn!(
                        job_id = %job_id,
                        %scope,
                        attempt = job.attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "calculation attempt failed, retrying"
                    );
                    retry_after = Some(delay);
                }
                Err(e) => {
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Utc::now());
                    job.error = Some(e.to_string());
                    job.retryable = e.is_retryable();
                    state.metrics.record_failed(elapsed_ms, e.error_code());
                    error!(
                        job_id = %job_id,
                        %scope,
                        attempts = job.attempts,
                        error = %e,
                        "calculation job failed"
                    );
                }
            }
        }

        match retry_after {
            Some(delay) => {
                let token = state.tokens.entry(job_id).or_insert_with(CancellationToken::new).clone();
                let shutdown = state.shutdown.clone();
                let inner = Arc::clone(self);
                self.tracker.spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => inner.requeue(job_id).await,
                        _ = token.cancelled() => {}
                        _ = shutdown.cancelled() => {}
                    }
                });
            }
            None => state.release_scope(scope, job_id),
        }
        state.record_depth();
        drop(guard);
        self.notify.notify_one();
    }

    /// 退避结束，任务回到待执行队列
    async fn requeue(&self, job_id: JobId) {
        let mut state = self.state.lock().await;
        let priority = match state.jobs.get(&job_id) {
            Some(job) if job.status == JobStatus::Pending => job.priority,
            _ => return,
        };
        if state.pending_keys.contains_key(&job_id) {
            return;
        }
        state.push_pending(job_id, priority);
        drop(state);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use standings_testing_utils::RecordingExecutor;

    fn manager() -> QueueManager {
        QueueManager::new(
            &QueueConfig::default(),
            Arc::new(RecordingExecutor::new()),
            CircuitBreakerRegistry::default(),
        )
    }

    #[tokio::test]
    async fn test_enqueue_requires_running_queue() {
        let queue = manager();
        let result = queue.add_calculation_job(1, 2024, JobPriority::Normal).await;
        assert!(matches!(result, Err(StandingsError::QueueStopped)));
    }

    #[tokio::test]
    async fn test_enqueue_validates_ids() {
        let queue = manager();
        queue.start().await.unwrap();
        let result = queue.add_calculation_job(0, 2024, JobPriority::Normal).await;
        assert!(matches!(result, Err(StandingsError::ValidationError(_))));
        let result = queue.add_calculation_job(1, -1, JobPriority::Normal).await;
        assert!(matches!(result, Err(StandingsError::ValidationError(_))));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_priority_upgrade_keeps_original_order_in_tier() {
        let queue = manager();
        queue.start().await.unwrap();
        queue.pause_queue().await;

        let first = queue.add_calculation_job(1, 2024, JobPriority::Low).await.unwrap();
        let second = queue.add_calculation_job(2, 2024, JobPriority::High).await.unwrap();
        assert_eq!(queue.jobs_ahead(first).await, 1);

        let same = queue.add_calculation_job(1, 2024, JobPriority::High).await.unwrap();
        assert_eq!(same, first);
        assert_eq!(queue.get_job(first).await.unwrap().priority, JobPriority::High);
        // 升级后仍按原始入队顺序排在同层任务之前
        assert_eq!(queue.jobs_ahead(first).await, 0);
        assert_eq!(queue.jobs_ahead(second).await, 1);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_lower_priority_duplicate_does_not_downgrade() {
        let queue = manager();
        queue.start().await.unwrap();
        queue.pause_queue().await;

        let id = queue.add_calculation_job(1, 2024, JobPriority::High).await.unwrap();
        queue.add_calculation_job(1, 2024, JobPriority::Low).await.unwrap();
        assert_eq!(queue.get_job(id).await.unwrap().priority, JobPriority::High);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_full() {
        let config = QueueConfig {
            max_queue_size: 2,
            ..QueueConfig::default()
        };
        let queue = QueueManager::new(
            &config,
            Arc::new(RecordingExecutor::new()),
            CircuitBreakerRegistry::default(),
        );
        queue.start().await.unwrap();
        queue.pause_queue().await;

        queue.add_calculation_job(1, 2024, JobPriority::Normal).await.unwrap();
        queue.add_calculation_job(2, 2024, JobPriority::Normal).await.unwrap();
        let result = queue.add_calculation_job(3, 2024, JobPriority::Normal).await;
        assert!(matches!(result, Err(StandingsError::QueueFull { max: 2 })));
        // 去重命中不受容量限制
        assert!(queue.add_calculation_job(1, 2024, JobPriority::Normal).await.is_ok());

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_settings_are_rejected() {
        let queue = manager();
        let result = queue
            .update_settings(SettingsUpdate {
                max_workers: Some(0),
                ..SettingsUpdate::default()
            })
            .await;
        assert!(matches!(result, Err(StandingsError::ValidationError(_))));
        assert_eq!(queue.settings().await.max_workers, 3);
    }
}
