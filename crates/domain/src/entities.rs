use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use standings_errors::{StandingsError, StandingsResult};
use uuid::Uuid;

use crate::value_objects::{JobPriority, JobStatus, JobTrigger, ScopeKey};

pub type JobId = Uuid;

/// 积分榜重算任务，由队列管理器独占
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJob {
    pub id: JobId,
    pub liga_id: i64,
    pub saison_id: i64,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub description: Option<String>,
    pub trigger: JobTrigger,
    pub retryable: bool,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
}

impl CalculationJob {
    pub fn new(scope: ScopeKey, priority: JobPriority, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
            priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            description: None,
            trigger: JobTrigger::default(),
            retryable: false,
            next_attempt_at: None,
            processing_time_ms: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_trigger(mut self, trigger: JobTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            liga_id: self.liga_id,
            saison_id: self.saison_id,
        }
    }

    /// 首次执行之外还剩余的重试次数
    pub fn has_retries_left(&self) -> bool {
        self.attempts <= self.max_retries
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// 积分榜中的球队引用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TeamRef {
    pub id: i64,
    pub name: String,
}

impl TeamRef {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// 一支球队在某个联赛/赛季中的积分榜行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    pub team_id: i64,
    pub team_name: String,
    pub liga_id: i64,
    pub saison_id: i64,
    pub spiele: u32,
    pub siege: u32,
    pub unentschieden: u32,
    pub niederlagen: u32,
    pub tore_fuer: u32,
    pub tore_gegen: u32,
    pub tordifferenz: i64,
    pub punkte: u32,
    pub platz: u32,
}

impl StandingsRow {
    pub fn empty(team: &TeamRef, scope: ScopeKey) -> Self {
        Self {
            team_id: team.id,
            team_name: team.name.clone(),
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
            spiele: 0,
            siege: 0,
            unentschieden: 0,
            niederlagen: 0,
            tore_fuer: 0,
            tore_gegen: 0,
            tordifferenz: 0,
            punkte: 0,
            platz: 0,
        }
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            liga_id: self.liga_id,
            saison_id: self.saison_id,
        }
    }

    pub fn reset(&mut self) {
        self.spiele = 0;
        self.siege = 0;
        self.unentschieden = 0;
        self.niederlagen = 0;
        self.tore_fuer = 0;
        self.tore_gegen = 0;
        self.tordifferenz = 0;
        self.punkte = 0;
    }

    /// 计入一场比赛，`scored`/`conceded` 为本队视角
    pub fn record(&mut self, scored: u32, conceded: u32) {
        self.spiele += 1;
        self.tore_fuer += scored;
        self.tore_gegen += conceded;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.siege += 1,
            std::cmp::Ordering::Equal => self.unentschieden += 1,
            std::cmp::Ordering::Less => self.niederlagen += 1,
        }
        self.tordifferenz = i64::from(self.tore_fuer) - i64::from(self.tore_gegen);
        self.punkte = self.siege * 3 + self.unentschieden;
    }

    pub fn invariants_hold(&self) -> bool {
        self.spiele == self.siege + self.unentschieden + self.niederlagen
            && self.punkte == self.siege * 3 + self.unentschieden
            && self.tordifferenz == i64::from(self.tore_fuer) - i64::from(self.tore_gegen)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchStatus {
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "LIVE")]
    Live,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "POSTPONED")]
    Postponed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Completed => "COMPLETED",
            MatchStatus::Postponed => "POSTPONED",
            MatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> StandingsResult<Self> {
        match value {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "COMPLETED" => Ok(MatchStatus::Completed),
            "POSTPONED" => Ok(MatchStatus::Postponed),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(StandingsError::Serialization(format!(
                "无效的比赛状态: {other}"
            ))),
        }
    }
}

/// 比赛，只有已完赛且双方比分齐全的比赛才计入积分榜
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: i64,
    pub liga_id: i64,
    pub saison_id: i64,
    pub heim: TeamRef,
    pub gast: TeamRef,
    pub heim_tore: Option<u32>,
    pub gast_tore: Option<u32>,
    pub status: MatchStatus,
}

impl Match {
    /// 返回计入积分榜的比分 (主队, 客队)
    pub fn final_score(&self) -> Option<(u32, u32)> {
        if self.status != MatchStatus::Completed {
            return None;
        }
        Some((self.heim_tore?, self.gast_tore?))
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            liga_id: self.liga_id,
            saison_id: self.saison_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Liga {
    pub id: i64,
    pub name: String,
    pub aktive_saison_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Saison {
    pub id: i64,
    pub liga_id: i64,
    pub name: String,
    pub aktiv: bool,
}

/// 积分榜快照，创建后不可修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub liga_id: i64,
    pub saison_id: i64,
    pub data: Vec<StandingsRow>,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub checksum: String,
    /// 存储位置，由存储后端加载时填充，不写入快照文件
    #[serde(skip)]
    pub location: Option<String>,
}

impl Snapshot {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            liga_id: self.liga_id,
            saison_id: self.saison_id,
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            liga_id: self.liga_id,
            saison_id: self.saison_id,
            created_at: self.created_at,
            description: self.description.clone(),
            row_count: self.data.len(),
            checksum: self.checksum.clone(),
            location: self.location.clone(),
        }
    }
}

/// 列表接口返回的快照元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: String,
    pub liga_id: i64,
    pub saison_id: i64,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub row_count: usize,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// 可在运行时修改的自动化设置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSettings {
    pub enabled: bool,
    pub max_workers: usize,
    pub max_retries: u32,
    pub job_timeout_ms: u64,
    pub default_priority: JobPriority,
    pub snapshot_before_calculation: bool,
}

impl AutomationSettings {
    pub fn validate(&self) -> StandingsResult<()> {
        if self.max_workers == 0 || self.max_workers > 64 {
            return Err(StandingsError::validation_error(format!(
                "maxWorkers 必须在 1 到 64 之间: {}",
                self.max_workers
            )));
        }
        if self.max_retries > 20 {
            return Err(StandingsError::validation_error(format!(
                "maxRetries 不能超过 20: {}",
                self.max_retries
            )));
        }
        if self.job_timeout_ms < 100 || self.job_timeout_ms > 3_600_000 {
            return Err(StandingsError::validation_error(format!(
                "jobTimeoutMs 必须在 100 到 3600000 之间: {}",
                self.job_timeout_ms
            )));
        }
        Ok(())
    }
}

/// 部分更新设置的请求体，缺省字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub max_workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub job_timeout_ms: Option<u64>,
    pub default_priority: Option<JobPriority>,
    pub snapshot_before_calculation: Option<bool>,
}

impl SettingsUpdate {
    pub fn apply_to(&self, settings: &AutomationSettings) -> AutomationSettings {
        AutomationSettings {
            enabled: self.enabled.unwrap_or(settings.enabled),
            max_workers: self.max_workers.unwrap_or(settings.max_workers),
            max_retries: self.max_retries.unwrap_or(settings.max_retries),
            job_timeout_ms: self.job_timeout_ms.unwrap_or(settings.job_timeout_ms),
            default_priority: self.default_priority.unwrap_or(settings.default_priority),
            snapshot_before_calculation: self
                .snapshot_before_calculation
                .unwrap_or(settings.snapshot_before_calculation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeKey {
        ScopeKey::new(1, 2024).unwrap()
    }

    #[test]
    fn test_row_record_keeps_invariants() {
        let mut row = StandingsRow::empty(&TeamRef::new(1, "Bayern"), scope());
        row.record(3, 1);
        row.record(2, 2);
        row.record(0, 1);

        assert_eq!(row.spiele, 3);
        assert_eq!((row.siege, row.unentschieden, row.niederlagen), (1, 1, 1));
        assert_eq!(row.punkte, 4);
        assert_eq!(row.tordifferenz, 1);
        assert!(row.invariants_hold());

        row.reset();
        assert_eq!(row.spiele, 0);
        assert!(row.invariants_hold());
    }

    #[test]
    fn test_final_score_requires_completed_match_with_both_scores() {
        let mut m = Match {
            id: 1,
            liga_id: 1,
            saison_id: 2024,
            heim: TeamRef::new(1, "A"),
            gast: TeamRef::new(2, "B"),
            heim_tore: Some(2),
            gast_tore: None,
            status: MatchStatus::Completed,
        };
        assert_eq!(m.final_score(), None);

        m.gast_tore = Some(0);
        assert_eq!(m.final_score(), Some((2, 0)));

        m.status = MatchStatus::Scheduled;
        assert_eq!(m.final_score(), None);
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = CalculationJob::new(scope(), JobPriority::High, 3)
            .with_description(Some("Ergebnis geändert".into()));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.has_retries_left());
        assert_eq!(job.scope(), scope());
    }

    #[test]
    fn test_snapshot_file_format_is_camel_case() {
        let snapshot = Snapshot {
            id: "snapshot_1_2024_x".into(),
            liga_id: 1,
            saison_id: 2024,
            data: vec![StandingsRow::empty(&TeamRef::new(1, "A"), scope())],
            created_at: Utc::now(),
            description: "test".into(),
            checksum: "abc".into(),
            location: Some("/tmp/x.json".into()),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("ligaId").is_some());
        assert!(value.get("saisonId").is_some());
        assert!(value.get("location").is_none());
        assert!(value["data"][0].get("toreFuer").is_some());
    }

    #[test]
    fn test_settings_update_and_validation() {
        let settings = AutomationSettings {
            enabled: true,
            max_workers: 3,
            max_retries: 3,
            job_timeout_ms: 30_000,
            default_priority: JobPriority::Normal,
            snapshot_before_calculation: false,
        };
        let update = SettingsUpdate {
            max_workers: Some(5),
            ..Default::default()
        };
        let updated = update.apply_to(&settings);
        assert_eq!(updated.max_workers, 5);
        assert_eq!(updated.max_retries, 3);
        assert!(updated.validate().is_ok());

        let invalid = SettingsUpdate {
            max_workers: Some(0),
            ..Default::default()
        }
        .apply_to(&settings);
        assert!(invalid.validate().is_err());
    }
}
