//! 积分榜重算调度
//!
//! 优先级任务队列、有界工作池、退避重试与熔断保护。

pub mod metrics;
pub mod queue_manager;
pub mod retry_policy;

pub use metrics::QueueMetrics;
pub use queue_manager::{JobRequest, QueueManager, QueueStatus};
pub use retry_policy::RetryPolicy;
