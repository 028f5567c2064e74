use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::admin::HealthState;
use crate::response::ApiResponse;
use crate::routes::AppState;

/// GET /system-health
///
/// 不健康时返回 503，降级仍返回 200。
pub async fn system_health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.admin.system_health().await;
    let status = match health.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
    };
    (status, ApiResponse::success(health))
}
