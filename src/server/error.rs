// API 错误类型
//
// 各业务模块的错误在这里统一映射为 HTTP 状态码和 {"error": "..."} 响应体

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::account::AccountError;
use crate::activity::ActivityError;
use crate::filesystem::FsError;

/// 返回给客户端的通用内部错误消息，详细原因只写日志
const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 缺少必填参数等请求错误
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Account(e) => match e {
                AccountError::Validation(_) => StatusCode::BAD_REQUEST,
                AccountError::AlreadyExists => StatusCode::CONFLICT,
                AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AccountError::Io(_) | AccountError::Corrupted(_) | AccountError::Hash(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Fs(e) => match e {
                FsError::InvalidName(_) => StatusCode::BAD_REQUEST,
                FsError::AccessDenied(_) => StatusCode::FORBIDDEN,
                FsError::HomeProtected => StatusCode::FORBIDDEN,
                FsError::NotFound(_) => StatusCode::NOT_FOUND,
                // 与注册冲突不同，文件夹重名沿用 400
                FsError::FolderExists => StatusCode::BAD_REQUEST,
                FsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Activity(e) => match e {
                ActivityError::InvalidUser => StatusCode::BAD_REQUEST,
                ActivityError::Io(_) | ActivityError::Encode(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Multipart(e) => e.status(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("后台任务异常退出: {}", e))
    }
}

/// 错误响应
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
            INTERNAL_MESSAGE.to_string()
        } else {
            if let Self::Fs(FsError::AccessDenied(path)) = &self {
                tracing::warn!("拒绝越权访问: {}", path);
            }
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::EntryKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AccountError::AlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AccountError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(FsError::FolderExists).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FsError::HomeProtected).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(FsError::AccessDenied("..".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(FsError::NotFound(EntryKind::File)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::bad_request("Username required").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "/secret/path is broken");
        let response = ApiError::from(FsError::Io(io)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
