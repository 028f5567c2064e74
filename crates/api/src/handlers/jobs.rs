use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use super::path_param;
use crate::error::{ApiError, ApiResult};
use crate::response::success;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /calculation-history/{ligaId}
pub async fn calculation_history(
    State(state): State<AppState>,
    liga_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let liga_id = path_param(liga_id)?;
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let jobs = state.admin.calculation_history(liga_id, query.limit).await?;
    Ok(success(jobs))
}

/// POST /jobs/{jobId}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let job_id = path_param(job_id)?;
    Ok(success(state.admin.cancel_job(job_id).await?))
}

/// POST /jobs/{jobId}/retry
pub async fn retry_job(
    State(state): State<AppState>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let job_id = path_param(job_id)?;
    Ok(success(state.admin.retry_job(job_id).await?))
}
