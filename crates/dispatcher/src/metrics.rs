use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};

/// 队列处理统计，每次任务结束时重新计算
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    pub total_processed: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub total_retries: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub average_processing_time_ms: f64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// 累积计数，`QueueMetrics` 由它导出
#[derive(Debug, Default)]
pub(crate) struct MetricsAggregate {
    completed: u64,
    failed: u64,
    cancelled: u64,
    retries: u64,
    processing_time_total_ms: u64,
    last_processed_at: Option<DateTime<Utc>>,
}

impl MetricsAggregate {
    pub(crate) fn record_enqueued(&self) {
        counter!("standings_jobs_enqueued_total").increment(1);
    }

    pub(crate) fn record_deduplicated(&self) {
        counter!("standings_jobs_deduplicated_total").increment(1);
    }

    pub(crate) fn record_completed(&mut self, processing_time_ms: u64) {
        self.completed += 1;
        self.processing_time_total_ms += processing_time_ms;
        self.last_processed_at = Some(Utc::now());
        counter!("standings_jobs_completed_total").increment(1);
        histogram!("standings_jobs_processing_time_ms").record(processing_time_ms as f64);
    }

    pub(crate) fn record_failed(&mut self, processing_time_ms: u64, error_code: &'static str) {
        self.failed += 1;
        self.processing_time_total_ms += processing_time_ms;
        self.last_processed_at = Some(Utc::now());
        counter!("standings_jobs_failed_total", "error" => error_code).increment(1);
        histogram!("standings_jobs_processing_time_ms").record(processing_time_ms as f64);
    }

    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
        counter!("standings_jobs_retried_total").increment(1);
    }

    pub(crate) fn record_cancelled(&mut self) {
        self.cancelled += 1;
        counter!("standings_jobs_cancelled_total").increment(1);
    }

    pub(crate) fn record_depth(&self, pending: usize, processing: usize) {
        gauge!("standings_jobs_pending").set(pending as f64);
        gauge!("standings_jobs_processing").set(processing as f64);
    }

    /// 平均处理时间（毫秒），尚无结束的任务时为 `None`
    pub(crate) fn average_processing_time_ms(&self) -> Option<f64> {
        let processed = self.completed + self.failed;
        if processed == 0 {
            None
        } else {
            Some(self.processing_time_total_ms as f64 / processed as f64)
        }
    }

    pub(crate) fn snapshot(&self) -> QueueMetrics {
        let processed = self.completed + self.failed;
        let (success_rate, error_rate) = if processed == 0 {
            (0.0, 0.0)
        } else {
            (
                self.completed as f64 / processed as f64,
                self.failed as f64 / processed as f64,
            )
        };

        QueueMetrics {
            total_processed: processed,
            total_completed: self.completed,
            total_failed: self.failed,
            total_cancelled: self.cancelled,
            total_retries: self.retries,
            success_rate,
            error_rate,
            average_processing_time_ms: self.average_processing_time_ms().unwrap_or(0.0),
            last_processed_at: self.last_processed_at,
        }
    }
}
