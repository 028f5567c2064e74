use serde::{Deserialize, Serialize};
use standings_errors::{StandingsError, StandingsResult};
use std::fmt;
use std::str::FromStr;

/// 计算任务优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobPriority {
    #[serde(rename = "HIGH")]
    High,
    #[default]
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "LOW")]
    Low,
}

impl JobPriority {
    /// 出队顺序，数值越小越先执行
    pub fn rank(self) -> u8 {
        match self {
            JobPriority::High => 0,
            JobPriority::Normal => 1,
            JobPriority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPriority::High => "HIGH",
            JobPriority::Normal => "NORMAL",
            JobPriority::Low => "LOW",
        }
    }

    pub fn is_higher_than(self, other: JobPriority) -> bool {
        self.rank() < other.rank()
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPriority {
    type Err = StandingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(JobPriority::High),
            "NORMAL" => Ok(JobPriority::Normal),
            "LOW" => Ok(JobPriority::Low),
            other => Err(StandingsError::validation_error(format!(
                "无效的优先级: {other}"
            ))),
        }
    }
}

/// 计算任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    /// PENDING 与 PROCESSING 任务占用其联赛/赛季作用域
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn is_finished(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JobTrigger {
    /// 比赛结果录入或修改
    #[default]
    #[serde(rename = "MATCH_RESULT")]
    MatchResult,
    /// 管理员手动触发
    #[serde(rename = "MANUAL")]
    Manual,
    /// 管理员重试失败任务
    #[serde(rename = "RETRY")]
    Retry,
}

/// 联赛/赛季作用域，去重与快照保留策略都按作用域进行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub liga_id: i64,
    pub saison_id: i64,
}

impl ScopeKey {
    pub fn new(liga_id: i64, saison_id: i64) -> StandingsResult<Self> {
        validate_liga_id(liga_id)?;
        if saison_id <= 0 {
            return Err(StandingsError::validation_error(format!(
                "saisonId 必须为正整数: {saison_id}"
            )));
        }
        Ok(Self { liga_id, saison_id })
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "liga {} / saison {}", self.liga_id, self.saison_id)
    }
}

pub fn validate_liga_id(liga_id: i64) -> StandingsResult<()> {
    if liga_id <= 0 {
        return Err(StandingsError::validation_error(format!(
            "ligaId 必须为正整数: {liga_id}"
        )));
    }
    Ok(())
}
