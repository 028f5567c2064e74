use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use standings_errors::StandingsResult;
use tokio_util::sync::CancellationToken;

use crate::entities::{AutomationSettings, CalculationJob};

/// 单次重算的结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOutcome {
    pub rows_updated: usize,
    pub snapshot_id: Option<String>,
}

/// 队列管理器调用的执行器
///
/// 实现需要在挂起点检查 `cancel`，被取消时返回 `Cancelled`。
#[async_trait]
pub trait CalculationExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &CalculationJob,
        cancel: CancellationToken,
    ) -> StandingsResult<CalculationOutcome>;

    /// 运行时设置变更时由队列管理器调用
    fn apply_settings(&self, _settings: &AutomationSettings) {}
}
