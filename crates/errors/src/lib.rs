use thiserror::Error;
use uuid::Uuid;


#[derive(Debug, Error)]
pub enum StandingsError {
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("联赛未找到: {liga_id}")]
    LigaNotFound { liga_id: i64 },
    #[error("赛季未找到: 联赛 {liga_id} 赛季 {saison_id}")]
    SaisonNotFound { liga_id: i64, saison_id: i64 },
    #[error("计算任务未找到: {id}")]
    JobNotFound { id: Uuid },
    #[error("快照未找到: {id}")]
    SnapshotNotFound { id: String },
    #[error("临时错误: {0}")]
    Transient(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("持久化错误: {0}")]
    Persistence(String),
    #[error("快照存储错误: {0}")]
    Snapshot(String),
    #[error("快照校验失败: {id} (期望 {expected}, 实际 {actual})")]
    CorruptSnapshot {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("队列未运行")]
    QueueStopped,
    #[error("队列已满: 最多 {max} 个待处理任务")]
    QueueFull { max: usize },
    #[error("熔断器已打开: {dependency}")]
    CircuitOpen { dependency: String },
    #[error("任务已取消: {id}")]
    Cancelled { id: Uuid },
    #[error("任务状态无效: {id} 当前状态 {status}")]
    InvalidJobState { id: Uuid, status: String },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type StandingsResult<T> = Result<T, StandingsError>;

impl StandingsError {
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn snapshot<S: Into<String>>(msg: S) -> Self {
        Self::Snapshot(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn liga_not_found(liga_id: i64) -> Self {
        Self::LigaNotFound { liga_id }
    }
    pub fn saison_not_found(liga_id: i64, saison_id: i64) -> Self {
        Self::SaisonNotFound { liga_id, saison_id }
    }
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn circuit_open<S: Into<String>>(dependency: S) -> Self {
        Self::CircuitOpen {
            dependency: dependency.into(),
        }
    }

    /// Errors the queue may reschedule with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StandingsError::Transient(_)
                | StandingsError::Timeout(_)
                | StandingsError::Database(_)
                | StandingsError::Persistence(_)
                | StandingsError::CircuitOpen { .. }
        )
    }

    /// Errors that indicate the protected dependency itself is unhealthy.
    ///
    /// Validation and not-found errors mean the dependency answered, so they
    /// never trip a circuit breaker.
    pub fn counts_as_dependency_failure(&self) -> bool {
        matches!(
            self,
            StandingsError::Transient(_)
                | StandingsError::Timeout(_)
                | StandingsError::Database(_)
                | StandingsError::Persistence(_)
                | StandingsError::Snapshot(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StandingsError::LigaNotFound { .. }
                | StandingsError::SaisonNotFound { .. }
                | StandingsError::JobNotFound { .. }
                | StandingsError::SnapshotNotFound { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StandingsError::ValidationError(_) => "VALIDATION_ERROR",
            StandingsError::LigaNotFound { .. }
            | StandingsError::SaisonNotFound { .. }
            | StandingsError::JobNotFound { .. }
            | StandingsError::SnapshotNotFound { .. } => "NOT_FOUND",
            StandingsError::Transient(_) | StandingsError::Timeout(_) => "TRANSIENT_ERROR",
            StandingsError::Database(_) | StandingsError::Persistence(_) => "PERSISTENCE_ERROR",
            StandingsError::Snapshot(_) => "SNAPSHOT_ERROR",
            StandingsError::CorruptSnapshot { .. } => "CORRUPT_SNAPSHOT",
            StandingsError::QueueStopped => "QUEUE_STOPPED",
            StandingsError::QueueFull { .. } => "QUEUE_FULL",
            StandingsError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            StandingsError::Cancelled { .. } => "CANCELLED",
            StandingsError::InvalidJobState { .. } => "INVALID_JOB_STATE",
            StandingsError::Configuration(_) => "CONFIGURATION_ERROR",
            StandingsError::Serialization(_) => "SERIALIZATION_ERROR",
            StandingsError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            StandingsError::LigaNotFound { .. } => "请求的联赛不存在",
            StandingsError::SaisonNotFound { .. } => "请求的赛季不存在",
            StandingsError::JobNotFound { .. } => "请求的计算任务不存在",
            StandingsError::SnapshotNotFound { .. } => "请求的快照不存在",
            StandingsError::ValidationError(_) => "输入数据验证失败",
            StandingsError::QueueStopped => "自动计算队列未运行",
            StandingsError::QueueFull { .. } => "队列已满，请稍后重试",
            StandingsError::CircuitOpen { .. } => "依赖服务暂时不可用，请稍后重试",
            StandingsError::CorruptSnapshot { .. } => "快照数据已损坏",
            StandingsError::Timeout(_) => "操作超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for StandingsError {
    fn from(err: serde_json::Error) -> Self {
        StandingsError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StandingsError {
    fn from(err: std::io::Error) -> Self {
        StandingsError::Snapshot(err.to_string())
    }
}

impl From<anyhow::Error> for StandingsError {
    fn from(err: anyhow::Error) -> Self {
        StandingsError::Internal(err.to_string())
    }
}
