// 应用状态

use crate::account::AccountStore;
use crate::activity::{ActivityAction, ActivityLog};
use crate::config::AppConfig;
use crate::filesystem::FileService;
use std::sync::Arc;

/// 应用全局状态
///
/// 各组件只持有自己的目录配置，互不共享可变状态，请求之间不加锁
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 账户存储
    pub accounts: Arc<AccountStore>,
    /// 用户文件服务
    pub files: Arc<FileService>,
    /// 操作记录
    pub activity: Arc<ActivityLog>,
}

impl AppState {
    /// 按给定配置创建应用状态，存储目录不存在时自动创建
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.storage.prepare_dirs()?;

        let accounts = AccountStore::new(&config.storage.accounts_dir);
        let files = FileService::new(&config.storage.users_dir);
        let activity = ActivityLog::new(&config.storage.activity_dir, &config.activity);

        Ok(Self {
            config: Arc::new(config),
            accounts: Arc::new(accounts),
            files: Arc::new(files),
            activity: Arc::new(activity),
        })
    }

    /// 记录用户操作，失败只写日志，不影响请求结果
    pub fn record_activity(&self, username: &str, action: ActivityAction, filename: &str) {
        if let Err(e) = self.activity.record(username, action, filename) {
            tracing::warn!(
                "写入操作记录失败: 用户={}, 操作={:?}, 错误: {}",
                username,
                action,
                e
            );
        }
    }
}
