use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{optional_json, path_param};
use crate::admin::CreateSnapshotRequest;
use crate::error::{ApiError, ApiResult};
use crate::response::{created, success, success_with_message};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    pub saison_id: Option<i64>,
}

/// GET /snapshots/{ligaId}
pub async fn list_snapshots(
    State(state): State<AppState>,
    liga_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let liga_id = path_param(liga_id)?;
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let snapshots = state.admin.list_snapshots(liga_id, query.saison_id).await?;
    Ok(success(snapshots))
}

/// POST /snapshots/{ligaId}
pub async fn create_snapshot(
    State(state): State<AppState>,
    liga_id: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let liga_id = path_param(liga_id)?;
    let request: CreateSnapshotRequest = optional_json(&body)?;
    Ok(created(state.admin.create_snapshot(liga_id, request).await?))
}

/// POST /snapshots/restore/{snapshotId}
pub async fn restore_snapshot(
    State(state): State<AppState>,
    snapshot_id: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let snapshot_id = path_param(snapshot_id)?;
    let outcome = state.admin.restore_snapshot(&snapshot_id).await?;
    Ok(success_with_message(outcome, "积分榜已恢复"))
}
