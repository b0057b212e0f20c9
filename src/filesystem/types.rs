// 文件系统模块数据类型定义

use serde::Serialize;
use std::fmt;

/// 条目类型，用于生成 "xxx not found" 消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::File => "File",
            Self::Folder => "Folder",
            Self::Directory => "Directory",
        };
        f.write_str(label)
    }
}

/// 文件系统错误
///
/// Display 文本直接返回给客户端，I/O 错误除外
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// 名称为空或清洗后为空
    #[error("{0}")]
    InvalidName(&'static str),

    /// 解析后的路径逃出了用户根目录
    #[error("Access denied")]
    AccessDenied(String),

    /// 试图删除用户根目录
    #[error("Cannot delete the Home directory")]
    HomeProtected,

    #[error("{0} not found")]
    NotFound(EntryKind),

    #[error("Folder already exists")]
    FolderExists,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 文件条目（列表接口返回）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileEntry {
    /// 文件名
    pub name: String,
    /// 创建时间（本地时间 ISO8601，无时区后缀）
    pub created: String,
    /// 文件大小（字节）
    pub size: u64,
}
