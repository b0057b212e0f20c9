// 账户API处理器

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

/// 注册/登录请求体
///
/// 字段缺失与空字符串同样按 400 处理，交给账户存储统一校验
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn parse_credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<(String, String)> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok((
        req.username.unwrap_or_default(),
        req.password.unwrap_or_default(),
    ))
}

/// 注册账户
///
/// POST /register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let (username, password) = parse_credentials(payload)?;
    info!("API: 注册账户 username={}", username.trim());

    // Argon2 哈希是 CPU 密集操作，放到阻塞线程池
    let accounts = state.accounts.clone();
    tokio::task::spawn_blocking(move || accounts.register(&username, &password)).await??;

    Ok(Json(SuccessResponse { success: true }))
}

/// 登录校验
///
/// POST /login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let (username, password) = parse_credentials(payload)?;
    info!("API: 登录 username={}", username.trim());

    let accounts = state.accounts.clone();
    tokio::task::spawn_blocking(move || accounts.login(&username, &password)).await??;

    Ok(Json(SuccessResponse { success: true }))
}
