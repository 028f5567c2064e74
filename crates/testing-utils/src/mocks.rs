//! Failure-injecting test doubles for the store and executor traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use standings_domain::{
    CalculationExecutor, CalculationJob, CalculationOutcome, Match, StandingsRow, StandingsStore,
    StandingsTransaction,
};
use standings_errors::{StandingsError, StandingsResult};
use standings_infrastructure::InMemoryStandingsStore;

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory store whose next `begin` calls or writes can be made to fail
#[derive(Clone)]
pub struct FlakyStandingsStore {
    inner: InMemoryStandingsStore,
    failing_begins: Arc<AtomicUsize>,
    failing_writes: Arc<AtomicUsize>,
}

impl FlakyStandingsStore {
    pub fn new(inner: InMemoryStandingsStore) -> Self {
        Self {
            inner,
            failing_begins: Arc::new(AtomicUsize::new(0)),
            failing_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The next `n` transactions fail to start with a transient error
    pub fn fail_next_begins(&self, n: usize) {
        self.failing_begins.store(n, Ordering::SeqCst);
    }

    /// The next `n` writes fail with a persistence error
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl StandingsStore for FlakyStandingsStore {
    async fn begin(&self) -> StandingsResult<Box<dyn StandingsTransaction>> {
        if take_one(&self.failing_begins) {
            return Err(StandingsError::transient("connection refused"));
        }
        let inner = self.inner.begin().await?;
        Ok(Box::new(FlakyTransaction {
            inner,
            failing_writes: Arc::clone(&self.failing_writes),
        }))
    }

    async fn find_standings(
        &self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<StandingsRow>> {
        self.inner.find_standings(liga_id, saison_id).await
    }

    async fn ping(&self) -> StandingsResult<()> {
        if self.failing_begins.load(Ordering::SeqCst) > 0 {
            return Err(StandingsError::transient("connection refused"));
        }
        Ok(())
    }
}

struct FlakyTransaction {
    inner: Box<dyn StandingsTransaction>,
    failing_writes: Arc<AtomicUsize>,
}

impl FlakyTransaction {
    fn check_write(&self) -> StandingsResult<()> {
        if take_one(&self.failing_writes) {
            return Err(StandingsError::persistence("disk I/O error"));
        }
        Ok(())
    }
}

#[async_trait]
impl StandingsTransaction for FlakyTransaction {
    async fn completed_matches(
        &mut self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<Match>> {
        self.inner.completed_matches(liga_id, saison_id).await
    }

    async fn standings(&mut self, liga_id: i64, saison_id: i64) -> StandingsResult<Vec<StandingsRow>> {
        self.inner.standings(liga_id, saison_id).await
    }

    async fn upsert_standings(&mut self, rows: &[StandingsRow]) -> StandingsResult<()> {
        self.check_write()?;
        self.inner.upsert_standings(rows).await
    }

    async fn replace_standings(
        &mut self,
        liga_id: i64,
        saison_id: i64,
        rows: &[StandingsRow],
    ) -> StandingsResult<()> {
        self.check_write()?;
        self.inner.replace_standings(liga_id, saison_id, rows).await
    }

    async fn commit(self: Box<Self>) -> StandingsResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StandingsResult<()> {
        self.inner.rollback().await
    }
}

/// One scripted executor step
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    FailTransient,
    FailPersistence,
    FailValidation,
    /// Sleeps, then succeeds
    Sleep(Duration),
    /// Blocks until the job is cancelled
    Hang,
}

/// Executor that plays back scripted steps and tracks concurrency
///
/// When the script is exhausted every call succeeds after `default_delay`.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Step>>,
    default_delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running executions observed
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn run_step(
        &self,
        step: Step,
        job: &CalculationJob,
        cancel: &CancellationToken,
    ) -> StandingsResult<CalculationOutcome> {
        match step {
            Step::Succeed => Ok(CalculationOutcome::default()),
            Step::FailTransient => Err(StandingsError::transient("database is locked")),
            Step::FailPersistence => Err(StandingsError::persistence("constraint violation")),
            Step::FailValidation => Err(StandingsError::validation_error("invalid match data")),
            Step::Sleep(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(CalculationOutcome::default()),
                    _ = cancel.cancelled() => Err(StandingsError::Cancelled { id: job.id }),
                }
            }
            Step::Hang => {
                cancel.cancelled().await;
                Err(StandingsError::Cancelled { id: job.id })
            }
        }
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CalculationExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        job: &CalculationJob,
        cancel: CancellationToken,
    ) -> StandingsResult<CalculationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Step::Sleep(self.default_delay));
        self.run_step(step, job, &cancel).await
    }
}

/// Executor that records the jobs it runs, in execution order
#[derive(Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<CalculationJob>>,
    delay: Duration,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub async fn executed(&self) -> Vec<CalculationJob> {
        self.executed.lock().await.clone()
    }

    /// `(liga_id, saison_id)` of the executed jobs
    pub async fn executed_scopes(&self) -> Vec<(i64, i64)> {
        self.executed
            .lock()
            .await
            .iter()
            .map(|job| (job.liga_id, job.saison_id))
            .collect()
    }
}

#[async_trait]
impl CalculationExecutor for RecordingExecutor {
    async fn execute(
        &self,
        job: &CalculationJob,
        _cancel: CancellationToken,
    ) -> StandingsResult<CalculationOutcome> {
        self.executed.lock().await.push(job.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CalculationOutcome::default())
    }
}
