// 用户文件API处理器

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::activity::ActivityAction;
use crate::filesystem::{secure_filename, EntryKind, FileEntry, FsError};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

/// 通用查询参数：?username=xxx&dir=yyy
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub username: Option<String>,
    /// 相对用户根目录的目录，缺省为根目录
    pub dir: Option<String>,
}

/// 删除文件查询参数：?username=xxx&file=a.txt&dir=yyy
#[derive(Debug, Deserialize)]
pub struct DeleteFileQuery {
    pub username: Option<String>,
    pub file: Option<String>,
    pub dir: Option<String>,
}

/// 新建文件夹请求体
#[derive(Debug, Default, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(rename = "folderName", default)]
    pub folder_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// 空字符串视同未提供
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require_username(username: Option<String>) -> ApiResult<String> {
    non_empty(username).ok_or_else(|| ApiError::bad_request("Username required"))
}

/// 操作记录中展示的相对路径
fn display_path(dir: Option<&str>, name: &str) -> String {
    match dir {
        Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), name),
        None => name.to_string(),
    }
}

/// 生成 Content-Disposition，非 ASCII 或含引号的名称先清洗
fn attachment_disposition(name: &str) -> String {
    let safe = if name.is_ascii() && !name.contains(['"', '\\']) && !name.chars().any(|c| c.is_ascii_control()) {
        name.to_string()
    } else {
        let cleaned = secure_filename(name);
        if cleaned.is_empty() {
            "download".to_string()
        } else {
            cleaned
        }
    };
    format!("attachment; filename=\"{}\"", safe)
}

/// 列出用户根目录下的文件夹
///
/// GET /subdirs?username=xxx
pub async fn list_subdirs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let username = require_username(query.username)?;
    let subdirs = state.files.list_subdirs(&username)?;
    Ok(Json(subdirs))
}

/// 列出目录中的文件
///
/// GET /files?username=xxx&dir=notes
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<FileEntry>>> {
    let username = require_username(query.username)?;
    let dir = non_empty(query.dir);

    let files = state.files.list_files(&username, dir.as_deref())?;
    Ok(Json(files))
}

/// 下载文件（附件形式，流式返回）
///
/// GET /download/notes/a.txt?username=xxx
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_path): Path<String>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Response> {
    let username = require_username(query.username)?;
    info!("API: 下载文件 username={}, path={}", username, file_path);

    let (path, name) = state.files.locate_download(&username, &file_path)?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
        // 定位之后被并发删除
        ErrorKind::NotFound => FsError::NotFound(EntryKind::File),
        _ => FsError::Io(e),
    })?;
    let size = file.metadata().await.map_err(FsError::Io)?.len();

    state.record_activity(&username, ActivityAction::Download, &file_path);

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, attachment_disposition(&name)),
        (header::CONTENT_LENGTH, size.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}

/// 上传文件（multipart 中名为 file 的字段）
///
/// POST /upload?username=xxx&dir=notes
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let username = require_username(query.username)?;
    let dir = non_empty(query.dir);

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        info!("API: 上传文件 username={}, dir={:?}, filename={}", username, dir, filename);

        let mut pending = state
            .files
            .begin_upload(&username, dir.as_deref(), &filename)
            .await?;
        while let Some(chunk) = field.chunk().await? {
            pending.write_chunk(&chunk).await?;
        }

        let stored = pending.name().to_string();
        pending.commit().await?;

        state.record_activity(
            &username,
            ActivityAction::Upload,
            &display_path(dir.as_deref(), &stored),
        );
        return Ok(MessageResponse::new(format!("Uploaded {} successfully", stored)));
    }

    Err(ApiError::bad_request("No file provided"))
}

/// 新建文件夹
///
/// POST /create-folder?username=xxx&dir=notes  body: {"folderName": "drafts"}
pub async fn create_folder(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let username = require_username(query.username)?;
    let dir = non_empty(query.dir);
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let folder_name = req.folder_name.unwrap_or_default();

    let created = state
        .files
        .create_folder(&username, dir.as_deref(), &folder_name)?;

    state.record_activity(
        &username,
        ActivityAction::CreateFolder,
        &display_path(dir.as_deref(), &created),
    );
    Ok(MessageResponse::new(format!(
        "Folder '{}' created successfully",
        created
    )))
}

/// 删除文件夹（递归）
///
/// DELETE /delete-folder?username=xxx&dir=notes
pub async fn delete_folder(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let username = require_username(query.username)?;
    let dir = non_empty(query.dir).ok_or_else(|| ApiError::bad_request("Directory name required"))?;
    info!("API: 删除文件夹 username={}, dir={}", username, dir);

    state.files.delete_folder(&username, &dir)?;

    state.record_activity(&username, ActivityAction::DeleteFolder, &dir);
    Ok(MessageResponse::new(format!(
        "Folder '{}' deleted successfully",
        dir
    )))
}

/// 删除文件
///
/// DELETE /delete-file?username=xxx&file=a.txt&dir=notes
pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<DeleteFileQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let (username, file) = match (non_empty(query.username), non_empty(query.file)) {
        (Some(username), Some(file)) => (username, file),
        _ => return Err(ApiError::bad_request("Username and filename required")),
    };
    let dir = non_empty(query.dir);
    info!("API: 删除文件 username={}, dir={:?}, file={}", username, dir, file);

    state.files.delete_file(&username, dir.as_deref(), &file)?;

    state.record_activity(
        &username,
        ActivityAction::Delete,
        &display_path(dir.as_deref(), &file),
    );
    Ok(MessageResponse::new(format!("{} deleted successfully", file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("a".into())), Some("a".to_string()));
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(None, "a.txt"), "a.txt");
        assert_eq!(display_path(Some("notes/"), "a.txt"), "notes/a.txt");
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("report.txt"),
            "attachment; filename=\"report.txt\""
        );
        assert_eq!(
            attachment_disposition("evil\".txt"),
            "attachment; filename=\"evil.txt\""
        );
        assert_eq!(
            attachment_disposition("报告"),
            "attachment; filename=\"download\""
        );
    }
}
