// 存储目录校验

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 存储目录不可用的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
    /// 路径不存在
    Missing,
    /// 路径指向文件
    NotDirectory,
    /// 没有写入权限
    NotWritable,
}

impl PathProblem {
    fn message(&self) -> &'static str {
        match self {
            Self::Missing => "路径不存在",
            Self::NotDirectory => "路径不是目录",
            Self::NotWritable => "路径不可写",
        }
    }
}

/// 存储目录校验器
///
/// 启动时对用户目录、账户目录、操作记录目录逐一检查，
/// 避免服务跑起来后才在第一次写入时失败。
pub struct PathValidator;

impl PathValidator {
    /// 校验目录存在、是目录且可写
    pub fn validate(path: &Path) -> Result<(), PathProblem> {
        if !path.exists() {
            return Err(PathProblem::Missing);
        }
        if !path.is_dir() {
            return Err(PathProblem::NotDirectory);
        }
        if !Self::check_writable(path) {
            return Err(PathProblem::NotWritable);
        }
        Ok(())
    }

    /// 通过创建探测文件检测写入权限
    fn check_writable(path: &Path) -> bool {
        let check_file = path.join(format!(".write_check_{}", uuid::Uuid::new_v4().simple()));

        match fs::File::create(&check_file) {
            Ok(_) => {
                let _ = fs::remove_file(&check_file);
                true
            }
            Err(_) => false,
        }
    }

    /// 校验失败时返回带路径的错误
    pub fn validate_or_error(path: &Path) -> Result<()> {
        if let Err(problem) = Self::validate(path) {
            anyhow::bail!("{}: {:?}", problem.message(), path);
        }
        Ok(())
    }

    /// 目录不存在时自动创建
    pub fn ensure_directory_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("无法创建目录: {:?}", path))?;
            tracing::info!("自动创建存储目录: {:?}", path);
        }
        Ok(())
    }
}
