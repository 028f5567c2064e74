//! # Standings Admin API
//!
//! 积分榜自动计算的管理接口，基于 Axum。
//!
//! ## API 端点
//!
//! - `POST /recalculate/{ligaId}` - 手动触发重算
//! - `GET /queue-status` - 队列状态与熔断器
//! - `POST /pause-automation` / `POST /resume-automation` - 暂停/恢复出队
//! - `GET /calculation-history/{ligaId}` - 计算历史
//! - `GET /system-health` - 队列、数据存储、快照存储的健康状况
//! - `GET|POST /settings` - 自动化设置
//! - `GET|POST /snapshots/{ligaId}` - 列出/创建快照
//! - `POST /snapshots/restore/{snapshotId}` - 回滚到快照
//! - `POST /jobs/{jobId}/cancel` / `POST /jobs/{jobId}/retry`
//!
//! ## 响应格式
//!
//! ```json
//! { "success": true, "data": { ... }, "timestamp": "2024-01-01T00:00:00Z" }
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "..." }, "timestamp": "..." }
//! ```

pub mod admin;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

pub use admin::{AdminService, HealthState, SystemHealth, TriggerRequest, TriggerResult};
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的管理API应用
pub fn create_app(admin: Arc<AdminService>) -> Router {
    create_routes(AppState { admin }).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
