// 配置管理模块

pub mod path_validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use path_validator::{PathProblem, PathValidator};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 存储配置
    pub storage: StorageConfig,
    /// 操作记录配置
    #[serde(default)]
    pub activity: ActivityConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（按天滚动，超过数量的旧文件自动删除）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// CORS允许的源（包含 "*" 时允许任意来源）
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_origins: default_cors_origins(),
        }
    }
}

/// 存储配置
///
/// 所有目录都在启动时注入到各组件中，不依赖进程级全局路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 用户文件根目录，每个用户在其下拥有独立子目录
    pub users_dir: PathBuf,
    /// 账户记录目录（每个用户一个 JSON 文件）
    pub accounts_dir: PathBuf,
    /// 操作记录目录（每个用户一个 JSONL 文件）
    #[serde(default = "default_activity_dir")]
    pub activity_dir: PathBuf,
    /// 单次上传请求体大小上限（字节，默认 1GB）
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// 默认数据根目录：当前工作目录下的 data，始终为绝对路径
fn default_data_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
}

fn default_activity_dir() -> PathBuf {
    default_data_dir().join("activity")
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1GB
}

impl StorageConfig {
    /// 以给定目录为根生成存储配置
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            users_dir: data_dir.join("users"),
            accounts_dir: data_dir.join("accounts"),
            activity_dir: data_dir.join("activity"),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }

    /// 确保所有存储目录存在且可写
    pub fn prepare_dirs(&self) -> Result<()> {
        for dir in [&self.users_dir, &self.accounts_dir, &self.activity_dir] {
            PathValidator::ensure_directory_exists(dir)?;
            PathValidator::validate_or_error(dir)
                .with_context(|| format!("存储目录不可用: {:?}", dir))?;
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under(default_data_dir())
    }
}

/// 操作记录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// 是否记录用户文件操作
    #[serde(default = "default_activity_enabled")]
    pub enabled: bool,
    /// 查询时最多返回的条目数
    #[serde(default = "default_activity_max_entries")]
    pub max_entries: usize,
}

fn default_activity_enabled() -> bool {
    true
}

fn default_activity_max_entries() -> usize {
    200
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: default_activity_enabled(),
            max_entries: default_activity_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            activity: ActivityConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);

        Ok(())
    }

    /// 加载配置，文件不存在时写出并使用默认配置
    ///
    /// 文件存在但无法读取或解析时返回错误，不覆盖用户的配置文件
    pub async fn load_or_default(path: &str) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("配置文件不存在，使用默认配置: {}", path);
                let default_config = Self::default();

                // 首次启动：写出默认配置，方便用户修改
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                return Ok(default_config);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file: {}", path))
            }
        };

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        tracing::info!("配置文件加载成功: {}", path);
        Ok(config)
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
