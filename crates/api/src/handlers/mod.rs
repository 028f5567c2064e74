pub mod automation;
pub mod jobs;
pub mod snapshots;
pub mod system;

use axum::body::Bytes;
use axum::extract::{rejection::PathRejection, Path};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// 路径参数解析失败时返回统一的错误信封
pub(crate) fn path_param<T>(path: Result<Path<T>, PathRejection>) -> ApiResult<T> {
    path.map(|Path(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// 请求体可以为空，为空时使用默认值
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("请求体格式错误: {e}")))
}
