use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::admin::AdminService;
use crate::handlers::{
    automation::{
        get_settings, pause_automation, queue_status, resume_automation, trigger_recalculation,
        update_settings,
    },
    jobs::{calculation_history, cancel_job, retry_job},
    snapshots::{create_snapshot, list_snapshots, restore_snapshot},
    system::system_health,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<AdminService>,
}

/// 创建管理API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 重算与队列控制
        .route("/recalculate/{liga_id}", post(trigger_recalculation))
        .route("/queue-status", get(queue_status))
        .route("/pause-automation", post(pause_automation))
        .route("/resume-automation", post(resume_automation))
        .route("/calculation-history/{liga_id}", get(calculation_history))
        .route("/settings", get(get_settings).post(update_settings))
        // 任务
        .route("/jobs/{job_id}/cancel", post(cancel_job))
        .route("/jobs/{job_id}/retry", post(retry_job))
        // 快照
        .route("/snapshots/{liga_id}", get(list_snapshots).post(create_snapshot))
        .route("/snapshots/restore/{snapshot_id}", post(restore_snapshot))
        // 系统监控
        .route("/system-health", get(system_health))
        .with_state(state)
}
