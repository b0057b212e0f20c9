// 操作记录API处理器

use axum::{
    extract::{Query, State},
    Json,
};

use super::files::UserQuery;
use crate::activity::ActivityEntry;
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

/// 获取用户最近的文件操作记录（最新在前）
///
/// GET /activity-log?username=xxx
pub async fn get_activity_log(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let username = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Username required"))?;

    let entries = state.activity.list(&username)?;
    Ok(Json(entries))
}
