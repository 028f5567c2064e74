use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    response::IntoResponse,
};

use standings_domain::SettingsUpdate;

use super::{optional_json, path_param};
use crate::admin::TriggerRequest;
use crate::error::ApiResult;
use crate::response::{accepted, success, success_with_message};
use crate::routes::AppState;

/// POST /recalculate/{ligaId}
pub async fn trigger_recalculation(
    State(state): State<AppState>,
    liga_id: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let liga_id = path_param(liga_id)?;
    let request: TriggerRequest = optional_json(&body)?;
    let result = state.admin.trigger_recalculation(liga_id, request).await?;
    Ok(accepted(result))
}

/// GET /queue-status
pub async fn queue_status(State(state): State<AppState>) -> impl IntoResponse {
    success(state.admin.queue_status().await)
}

/// POST /pause-automation
pub async fn pause_automation(State(state): State<AppState>) -> impl IntoResponse {
    success_with_message(state.admin.pause_automation().await, "自动计算已暂停")
}

/// POST /resume-automation
pub async fn resume_automation(State(state): State<AppState>) -> impl IntoResponse {
    success_with_message(state.admin.resume_automation().await, "自动计算已恢复")
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    success(state.admin.get_settings().await)
}

/// POST /settings
pub async fn update_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let update: SettingsUpdate = optional_json(&body)?;
    let settings = state.admin.update_settings(update).await?;
    Ok(success_with_message(settings, "设置已更新"))
}
