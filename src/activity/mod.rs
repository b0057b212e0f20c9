//! 用户操作记录
//!
//! 每个用户一个 JSON Lines 文件，每行一条操作：
//! ```text
//! {"action":"upload","filename":"report.txt","timestamp":"2025-01-31T08:00:00Z"}
//! {"action":"delete","filename":"old.txt","timestamp":"2025-01-31T08:05:12Z"}
//! ```
//! 正常情况下只追加；文件超过阈值时压缩为最近的若干条。
//! 查询时按时间倒序返回最近的若干条。

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ActivityConfig;
use crate::filesystem::secure_filename;

/// 操作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityAction {
    Upload,
    Download,
    Delete,
    CreateFolder,
    DeleteFolder,
}

/// 单条操作记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub action: ActivityAction,
    /// 文件或文件夹名（含所在目录时为相对路径）
    pub filename: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("Invalid username")]
    InvalidUser,

    #[error("Failed to access activity log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode activity entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 单条记录的估算字节数，文件超过 `max_entries` 倍时触发压缩
const COMPACT_BYTES_PER_ENTRY: u64 = 512;

/// 用户操作记录
#[derive(Debug)]
pub struct ActivityLog {
    dir: PathBuf,
    enabled: bool,
    max_entries: usize,
    /// 串行化追加与压缩，压缩期间的追加不会丢失
    write_lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(dir: impl Into<PathBuf>, config: &ActivityConfig) -> Self {
        Self {
            dir: dir.into(),
            enabled: config.enabled,
            max_entries: config.max_entries,
            write_lock: Mutex::new(()),
        }
    }

    fn log_path(&self, username: &str) -> Result<PathBuf, ActivityError> {
        let token = secure_filename(username);
        if token.is_empty() {
            return Err(ActivityError::InvalidUser);
        }
        Ok(self.dir.join(format!("{}.jsonl", token)))
    }

    fn compact_threshold(&self) -> u64 {
        (self.max_entries as u64).max(1) * COMPACT_BYTES_PER_ENTRY
    }

    /// 追加一条记录；关闭记录功能时直接返回
    ///
    /// 文件超过阈值时只保留最近 `max_entries` 条
    pub fn record(
        &self,
        username: &str,
        action: ActivityAction,
        filename: &str,
    ) -> Result<(), ActivityError> {
        if !self.enabled {
            return Ok(());
        }

        let entry = ActivityEntry {
            action,
            filename: filename.to_string(),
            timestamp: Utc::now(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let path = self.log_path(username)?;
        let _guard = self.write_lock.lock();

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        // 整行一次写入
        file.write_all(&line)?;

        if file.metadata()?.len() > self.compact_threshold() {
            drop(file);
            self.compact(&path)?;
        }
        Ok(())
    }

    /// 用最近的记录重写日志文件（临时文件 + 改名）
    fn compact(&self, path: &Path) -> Result<(), ActivityError> {
        let Some(recent) = read_recent(path, self.max_entries)? else {
            return Ok(());
        };

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let written = (|| -> Result<(), ActivityError> {
            let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
            for entry in &recent {
                serde_json::to_writer(&mut writer, entry)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            fs::rename(&temp_path, path)?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        debug!("操作记录已压缩: {:?}, 保留 {} 条", path, recent.len());
        Ok(())
    }

    /// 最近的操作记录，最新的在前
    pub fn list(&self, username: &str) -> Result<Vec<ActivityEntry>, ActivityError> {
        let path = self.log_path(username)?;
        let recent = read_recent(&path, self.max_entries)?.unwrap_or_default();
        Ok(recent.into_iter().rev().collect())
    }
}

/// 顺序读取日志，只保留最后 `limit` 条（按写入顺序）；文件不存在返回 None
fn read_recent(path: &Path, limit: usize) -> Result<Option<VecDeque<ActivityEntry>>, ActivityError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut recent = VecDeque::with_capacity(limit.min(1024));
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ActivityEntry>(&line) {
            Ok(entry) => {
                if recent.len() == limit {
                    recent.pop_front();
                }
                if limit > 0 {
                    recent.push_back(entry);
                }
            }
            Err(e) => warn!("跳过无法解析的操作记录: {:?} 第 {} 行, 错误: {}", path, index + 1, e),
        }
    }

    Ok(Some(recent))
}
