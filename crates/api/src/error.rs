use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use standings_errors::StandingsError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("积分榜服务错误: {0}")]
    Standings(#[from] StandingsError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Standings(err) => match err {
                StandingsError::ValidationError(_) => StatusCode::BAD_REQUEST,
                StandingsError::LigaNotFound { .. }
                | StandingsError::SaisonNotFound { .. }
                | StandingsError::JobNotFound { .. }
                | StandingsError::SnapshotNotFound { .. } => StatusCode::NOT_FOUND,
                StandingsError::InvalidJobState { .. } => StatusCode::CONFLICT,
                StandingsError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
                StandingsError::QueueStopped | StandingsError::CircuitOpen { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                StandingsError::CorruptSnapshot { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Standings(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, details) = match &self {
            ApiError::BadRequest(msg) => (msg.clone(), None),
            ApiError::Standings(err) if status.is_client_error() => {
                (err.user_message().to_string(), Some(err.to_string()))
            }
            ApiError::Standings(err) => {
                // 服务端错误只记录细节，不返回给调用方
                error!(error = %err, "admin request failed");
                (err.user_message().to_string(), None)
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message,
                "details": details,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_not_found_errors_map_to_404() {
        let err = ApiError::from(StandingsError::liga_not_found(42));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err = ApiError::from(StandingsError::job_not_found(Uuid::nil()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            ApiError::from(StandingsError::validation_error("x")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("bad json".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StandingsError::InvalidJobState {
                id: Uuid::nil(),
                status: "COMPLETED".into()
            })
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unavailable_and_internal() {
        assert_eq!(
            ApiError::from(StandingsError::QueueStopped).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(StandingsError::persistence("disk")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("ligaId".into());
        assert_eq!(err.to_string(), "请求参数错误: ligaId");
    }
}
