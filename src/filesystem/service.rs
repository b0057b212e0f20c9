// 用户文件服务
//
// 提供子目录列表、文件列表、新建/删除文件夹、删除文件、上传落盘、下载定位

use std::fs::{self, DirEntry};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use super::guard::SandboxGuard;
use super::sanitize::secure_filename;
use super::types::*;

/// 上传临时文件前缀和后缀，列表时隐藏
///
/// 临时名只由 uuid 组成，不拼接目标文件名，避免长文件名超过 NAME_MAX
const PARTIAL_PREFIX: &str = ".upload-";
const PARTIAL_SUFFIX: &str = ".part";

/// 受保护的根目录名（前端把用户根目录显示为 Home）
const HOME_DIR_NAME: &str = "home";

/// 用户文件服务
#[derive(Debug, Clone)]
pub struct FileService {
    guard: SandboxGuard,
}

impl FileService {
    /// 创建新的文件服务
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            guard: SandboxGuard::new(users_dir),
        }
    }

    pub fn guard(&self) -> &SandboxGuard {
        &self.guard
    }

    /// 列出用户根目录下的直接子目录（不递归）
    pub fn list_subdirs(&self, username: &str) -> Result<Vec<String>, FsError> {
        let root = self.guard.user_root(username)?;

        let mut names: Vec<String> = fs::read_dir(&root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();

        names.sort();
        Ok(names)
    }

    /// 列出目录中的文件（不含子目录）
    ///
    /// `dir` 为空时列出用户根目录
    pub fn list_files(&self, username: &str, dir: Option<&str>) -> Result<Vec<FileEntry>, FsError> {
        let target = self.guard.resolve(username, &dir_segments(dir))?;

        if !target.is_dir() {
            return Err(FsError::NotFound(EntryKind::Directory));
        }

        let read_dir = fs::read_dir(&target).map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", target, e);
            FsError::Io(e)
        })?;

        let mut entries: Vec<FileEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter(|entry| !is_partial_upload(&entry.file_name().to_string_lossy()))
            .filter_map(|entry| to_file_entry(&entry))
            .collect();

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// 新建文件夹，返回实际落盘的（清洗后的）名称
    pub fn create_folder(
        &self,
        username: &str,
        dir: Option<&str>,
        folder_name: &str,
    ) -> Result<String, FsError> {
        let folder_name = folder_name.trim();
        if folder_name.is_empty() {
            return Err(FsError::InvalidName("Folder name required"));
        }

        let safe_name = secure_filename(folder_name);
        if safe_name.is_empty() {
            return Err(FsError::InvalidName("Invalid folder name"));
        }

        let parent = self.guard.resolve(username, &dir_segments(dir))?;
        let target = self.guard.resolve(username, &with_name(dir, &safe_name))?;

        fs::create_dir_all(&parent)?;
        match fs::create_dir(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(FsError::FolderExists),
            Err(e) => return Err(FsError::Io(e)),
        }

        tracing::info!("新建文件夹: 用户={}, 路径={:?}", username, target);
        Ok(safe_name)
    }

    /// 递归删除文件夹，不可恢复
    pub fn delete_folder(&self, username: &str, dir: &str) -> Result<(), FsError> {
        let dir = dir.trim();
        if dir.is_empty() {
            return Err(FsError::InvalidName("Directory name required"));
        }
        // 无论磁盘上是否真的有名为 home 的文件夹，一律拒绝
        if dir.eq_ignore_ascii_case(HOME_DIR_NAME) {
            return Err(FsError::HomeProtected);
        }

        let root = self.guard.user_root(username)?;
        let target = self.guard.resolve(username, &[dir])?;
        if target == root {
            return Err(FsError::HomeProtected);
        }

        if !target.is_dir() {
            return Err(FsError::NotFound(EntryKind::Folder));
        }

        fs::remove_dir_all(&target)?;
        tracing::info!("删除文件夹: 用户={}, 路径={:?}", username, target);
        Ok(())
    }

    /// 删除单个文件
    pub fn delete_file(&self, username: &str, dir: Option<&str>, file: &str) -> Result<(), FsError> {
        let target = self.guard.resolve(username, &with_name(dir, file))?;

        if !target.is_file() {
            return Err(FsError::NotFound(EntryKind::File));
        }

        fs::remove_file(&target)?;
        tracing::info!("删除文件: 用户={}, 路径={:?}", username, target);
        Ok(())
    }

    /// 定位待下载文件，返回绝对路径和下载文件名
    pub fn locate_download(&self, username: &str, file_path: &str) -> Result<(PathBuf, String), FsError> {
        let target = self.guard.resolve(username, &[file_path])?;

        if !target.is_file() {
            return Err(FsError::NotFound(EntryKind::File));
        }

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or(FsError::NotFound(EntryKind::File))?;

        Ok((target, name))
    }

    /// 开始一次上传
    ///
    /// 目标目录不存在时自动创建；数据先写入同目录下的临时文件，
    /// `commit` 时再改名，同名文件会被覆盖。
    pub async fn begin_upload(
        &self,
        username: &str,
        dir: Option<&str>,
        filename: &str,
    ) -> Result<PendingUpload, FsError> {
        if filename.is_empty() {
            return Err(FsError::InvalidName("Empty filename"));
        }

        let safe_name = secure_filename(filename);
        if safe_name.is_empty() {
            return Err(FsError::InvalidName("Invalid filename"));
        }

        let upload_dir = self.guard.resolve(username, &dir_segments(dir))?;
        let final_path = self.guard.resolve(username, &with_name(dir, &safe_name))?;

        tokio::fs::create_dir_all(&upload_dir).await?;
        if final_path.is_dir() {
            return Err(FsError::FolderExists);
        }

        let temp_path = upload_dir.join(format!(
            "{}{}{}",
            PARTIAL_PREFIX,
            uuid::Uuid::new_v4().simple(),
            PARTIAL_SUFFIX
        ));
        let file = tokio::fs::File::create(&temp_path).await?;

        Ok(PendingUpload {
            file: Some(file),
            temp_path,
            final_path,
            name: safe_name,
            written: 0,
        })
    }
}

/// 进行中的上传
///
/// 未 `commit` 就被丢弃时（出错或客户端断开）删除临时文件
#[derive(Debug)]
pub struct PendingUpload {
    file: Option<tokio::fs::File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    name: String,
    written: u64,
}

impl PendingUpload {
    /// 清洗后的文件名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 追加一块数据
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), FsError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
            self.written += chunk.len() as u64;
        }
        Ok(())
    }

    /// 落盘并改名为最终文件名，返回写入字节数
    pub async fn commit(mut self) -> Result<u64, FsError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        tracing::info!(
            "上传完成: 路径={:?}, 大小={} 字节",
            self.final_path,
            self.written
        );

        // 已改名，Drop 中的清理会得到 NotFound，忽略即可
        Ok(self.written)
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.temp_path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("清理上传临时文件失败: {:?}, 错误: {}", self.temp_path, e);
            }
        }
    }
}

fn dir_segments(dir: Option<&str>) -> Vec<&str> {
    dir.into_iter().collect()
}

fn with_name<'a>(dir: Option<&'a str>, name: &'a str) -> Vec<&'a str> {
    dir.into_iter().chain(std::iter::once(name)).collect()
}

fn is_partial_upload(name: &str) -> bool {
    name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

/// 将 DirEntry 转换为 FileEntry，元数据读取失败的条目跳过
fn to_file_entry(entry: &DirEntry) -> Option<FileEntry> {
    // 跟随符号链接，与 is_file 判断保持一致
    let metadata = fs::metadata(entry.path()).ok()?;

    // 部分文件系统不支持创建时间，退回到修改时间
    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(local_iso8601)
        .unwrap_or_default();

    Some(FileEntry {
        name: entry.file_name().to_string_lossy().to_string(),
        created,
        size: metadata.len(),
    })
}

/// SystemTime 转为本地时间 ISO8601 字符串（微秒精度）
fn local_iso8601(time: SystemTime) -> String {
    let datetime: DateTime<Local> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> (TempDir, FileService) {
        let temp_dir = TempDir::new().unwrap();
        let service = FileService::new(temp_dir.path().join("users"));
        (temp_dir, service)
    }

    async fn upload(service: &FileService, user: &str, dir: Option<&str>, name: &str, data: &[u8]) -> String {
        let mut pending = service.begin_upload(user, dir, name).await.unwrap();
        pending.write_chunk(data).await.unwrap();
        let stored = pending.name().to_string();
        pending.commit().await.unwrap();
        stored
    }

    #[test]
    fn test_list_subdirs_only_direct_children() {
        let (_tmp, service) = service();
        service.create_folder("alice", None, "notes").unwrap();
        service.create_folder("alice", None, "photos").unwrap();
        service.create_folder("alice", Some("notes"), "deep").unwrap();

        let root = service.guard().user_root("alice").unwrap();
        fs::write(root.join("loose.txt"), "x").unwrap();

        assert_eq!(service.list_subdirs("alice").unwrap(), vec!["notes", "photos"]);
    }

    #[test]
    fn test_list_subdirs_new_user_is_empty() {
        let (_tmp, service) = service();
        assert!(service.list_subdirs("newbie").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_files_listed_only_in_their_folder() {
        let (_tmp, service) = service();
        service.create_folder("alice", None, "notes").unwrap();
        upload(&service, "alice", Some("notes"), "a.txt", b"hello").await;

        let in_notes = service.list_files("alice", Some("notes")).unwrap();
        assert_eq!(in_notes.len(), 1);
        assert_eq!(in_notes[0].name, "a.txt");
        assert_eq!(in_notes[0].size, 5);
        assert!(!in_notes[0].created.is_empty());

        let at_root = service.list_files("alice", None).unwrap();
        assert!(at_root.is_empty(), "根目录不应包含 notes 中的文件或子目录");
    }

    #[test]
    fn test_list_files_missing_dir() {
        let (_tmp, service) = service();
        let result = service.list_files("alice", Some("nope"));
        assert!(matches!(result, Err(FsError::NotFound(EntryKind::Directory))));
    }

    #[test]
    fn test_create_folder_conflicts_and_validation() {
        let (_tmp, service) = service();

        assert_eq!(service.create_folder("alice", None, " My Docs ").unwrap(), "My_Docs");
        assert!(matches!(
            service.create_folder("alice", None, "My Docs"),
            Err(FsError::FolderExists)
        ));
        assert!(matches!(
            service.create_folder("alice", None, "   "),
            Err(FsError::InvalidName("Folder name required"))
        ));
        assert!(matches!(
            service.create_folder("alice", None, "***"),
            Err(FsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_create_folder_traversal_name_is_flattened() {
        let (tmp, service) = service();

        let created = service.create_folder("alice", None, "../../escape").unwrap();
        assert_eq!(created, "escape");
        assert!(!tmp.path().join("escape").exists());
    }

    #[test]
    fn test_delete_home_always_forbidden() {
        let (_tmp, service) = service();
        service.create_folder("alice", None, "home").unwrap();

        for name in ["home", "Home", "HOME", " home "] {
            assert!(matches!(
                service.delete_folder("alice", name),
                Err(FsError::HomeProtected)
            ));
        }
        // 同名文件夹仍在
        assert_eq!(service.list_subdirs("alice").unwrap(), vec!["home"]);
    }

    #[test]
    fn test_delete_folder_resolving_to_root_forbidden() {
        let (_tmp, service) = service();
        service.create_folder("alice", None, "notes").unwrap();

        assert!(matches!(
            service.delete_folder("alice", "notes/.."),
            Err(FsError::HomeProtected)
        ));
        assert!(matches!(
            service.delete_folder("alice", "."),
            Err(FsError::HomeProtected)
        ));
        assert!(service.guard().user_root("alice").unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_delete_folder_recursive() {
        let (_tmp, service) = service();
        service.create_folder("alice", None, "notes").unwrap();
        service.create_folder("alice", Some("notes"), "inner").unwrap();
        upload(&service, "alice", Some("notes/inner"), "x.txt", b"x").await;

        service.delete_folder("alice", "notes").unwrap();
        assert!(service.list_subdirs("alice").unwrap().is_empty());
        assert!(matches!(
            service.delete_folder("alice", "notes"),
            Err(FsError::NotFound(EntryKind::Folder))
        ));
    }

    #[tokio::test]
    async fn test_delete_folder_on_file_is_not_found() {
        let (_tmp, service) = service();
        upload(&service, "alice", None, "a.txt", b"x").await;

        assert!(matches!(
            service.delete_folder("alice", "a.txt"),
            Err(FsError::NotFound(EntryKind::Folder))
        ));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (_tmp, service) = service();
        upload(&service, "alice", Some("docs"), "a.txt", b"x").await;

        service.delete_file("alice", Some("docs"), "a.txt").unwrap();
        assert!(service.list_files("alice", Some("docs")).unwrap().is_empty());
        assert!(matches!(
            service.delete_file("alice", Some("docs"), "a.txt"),
            Err(FsError::NotFound(EntryKind::File))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_outside_sandbox_rejected() {
        let (tmp, service) = service();
        let victim = tmp.path().join("victim.txt");
        fs::write(&victim, "keep me").unwrap();

        let result = service.delete_file("alice", None, "../../victim.txt");
        assert!(matches!(result, Err(FsError::AccessDenied(_))));
        assert!(victim.exists());
    }

    #[tokio::test]
    async fn test_upload_sanitizes_and_overwrites() {
        let (_tmp, service) = service();

        let stored = upload(&service, "alice", None, "my report?.txt", b"v1").await;
        assert_eq!(stored, "my_report.txt");
        upload(&service, "alice", None, "my report.txt", b"version2").await;

        let files = service.list_files("alice", None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 8);
    }

    #[tokio::test]
    async fn test_upload_long_filename() {
        let (_tmp, service) = service();
        let long_name = format!("{}.txt", "a".repeat(240));

        let stored = upload(&service, "alice", None, &long_name, b"long").await;
        assert_eq!(stored, long_name);

        let files = service.list_files("alice", None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, long_name);
        assert_eq!(files[0].size, 4);
    }

    #[test]
    fn test_partial_upload_names() {
        assert!(is_partial_upload(".upload-0123abcd.part"));
        assert!(!is_partial_upload("notes.part"));
        assert!(!is_partial_upload(".hidden"));
    }

    #[tokio::test]
    async fn test_upload_creates_missing_dir() {
        let (_tmp, service) = service();
        upload(&service, "alice", Some("new/nested"), "a.bin", b"\x00\x01").await;

        let files = service.list_files("alice", Some("new/nested")).unwrap();
        assert_eq!(files[0].name, "a.bin");
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_names() {
        let (_tmp, service) = service();

        assert!(matches!(
            service.begin_upload("alice", None, "").await,
            Err(FsError::InvalidName("Empty filename"))
        ));
        assert!(matches!(
            service.begin_upload("alice", None, "???").await,
            Err(FsError::InvalidName("Invalid filename"))
        ));
        assert!(matches!(
            service.begin_upload("alice", Some("../bob"), "a.txt").await,
            Err(FsError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_upload_leaves_no_trace() {
        let (_tmp, service) = service();

        let mut pending = service.begin_upload("alice", None, "big.iso").await.unwrap();
        pending.write_chunk(b"partial").await.unwrap();

        let root = service.guard().user_root("alice").unwrap();
        // 进行中的临时文件不出现在列表中
        assert!(service.list_files("alice", None).unwrap().is_empty());
        drop(pending);

        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (_tmp, service) = service();
        upload(&service, "alice", None, "secret.txt", b"s").await;

        assert!(service.list_files("bob", None).unwrap().is_empty());
        assert!(matches!(
            service.locate_download("bob", "secret.txt"),
            Err(FsError::NotFound(EntryKind::File))
        ));
    }

    #[tokio::test]
    async fn test_locate_download() {
        let (_tmp, service) = service();
        upload(&service, "alice", Some("notes"), "a.txt", b"X").await;

        let (path, name) = service.locate_download("alice", "notes/a.txt").unwrap();
        assert_eq!(name, "a.txt");
        assert_eq!(fs::read(path).unwrap(), b"X");

        assert!(matches!(
            service.locate_download("alice", "notes"),
            Err(FsError::NotFound(EntryKind::File))
        ));
        assert!(matches!(
            service.locate_download("alice", "../../etc/passwd"),
            Err(FsError::AccessDenied(_))
        ));
    }
}
