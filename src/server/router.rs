// 路由构建

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers;
use super::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "file-locker".to_string(),
    })
}

/// 按配置构建 CORS 层，包含 "*" 时允许任意来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// 构建完整应用路由
pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(cors_layer(&state.config.server.cors_origins));

    let body_limit = state.config.storage.max_upload_bytes;

    Router::new()
        // 账户
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        // 目录与文件
        .route("/subdirs", get(handlers::list_subdirs))
        .route("/files", get(handlers::list_files))
        .route("/download/*path", get(handlers::download_file))
        .route("/upload", post(handlers::upload_file))
        .route("/create-folder", post(handlers::create_folder))
        .route("/delete-folder", delete(handlers::delete_folder))
        .route("/delete-file", delete(handlers::delete_file))
        // 操作记录
        .route("/activity-log", get(handlers::get_activity_log))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(middleware)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_wildcard_and_list() {
        // 仅验证构建不会 panic
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&[]);
        let _ = cors_layer(&[
            "http://localhost:5173".to_string(),
            "bad\nvalue".to_string(),
        ]);
    }
}
