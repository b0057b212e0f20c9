// 用户沙箱守卫
//
// 把用户名映射到独立根目录，并保证所有路径解析结果都落在该根目录内

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::sanitize::secure_filename;
use super::types::FsError;

/// 用户沙箱守卫
#[derive(Debug, Clone)]
pub struct SandboxGuard {
    users_dir: PathBuf,
}

impl SandboxGuard {
    /// 创建守卫，`users_dir` 下每个子目录对应一个用户
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_dir: users_dir.into(),
        }
    }

    /// 获取用户根目录（不存在时创建），返回规范化后的绝对路径
    pub fn user_root(&self, username: &str) -> Result<PathBuf, FsError> {
        let token = secure_filename(username);
        if token.is_empty() {
            return Err(FsError::InvalidName("Invalid username"));
        }

        let root = self.users_dir.join(token);
        fs::create_dir_all(&root)?;
        Ok(dunce::canonicalize(&root)?)
    }

    /// 将相对路径片段解析到用户根目录下
    ///
    /// 片段中的 `.`/`..` 先按词法处理，`..` 越过根目录直接拒绝；
    /// 之后对最深的已存在祖先做一次真实路径规范化，拦截指向外部的符号链接。
    /// 包含关系按路径组件比较，`/data/bob2` 不会被当成 `/data/bob` 的子路径。
    pub fn resolve<S: AsRef<str>>(&self, username: &str, segments: &[S]) -> Result<PathBuf, FsError> {
        let root = self.user_root(username)?;
        let candidate = join_within(&root, segments)?;

        let existing = deepest_existing(&candidate);
        let real = dunce::canonicalize(existing)
            .map_err(|_| FsError::AccessDenied(display_segments(segments)))?;

        if !real.starts_with(&root) {
            tracing::warn!(
                "拦截越权路径: 用户={}, 请求={}, 实际={:?}",
                username,
                display_segments(segments),
                real
            );
            return Err(FsError::AccessDenied(display_segments(segments)));
        }

        Ok(candidate)
    }
}

/// 词法拼接，拒绝绝对路径和越过根目录的 `..`
fn join_within<S: AsRef<str>>(root: &Path, segments: &[S]) -> Result<PathBuf, FsError> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for segment in segments {
        for component in Path::new(segment.as_ref()).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(FsError::AccessDenied(display_segments(segments)));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(FsError::AccessDenied(display_segments(segments)));
                }
            }
        }
    }

    Ok(resolved)
}

/// 沿父目录向上找到第一个存在的路径（符号链接本身也算存在）
fn deepest_existing(path: &Path) -> &Path {
    let mut current = path;
    while fs::symlink_metadata(current).is_err() {
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

fn display_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/")
}
