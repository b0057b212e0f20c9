// File Locker Rust Library
// 多用户隔离的文件存储服务核心库

// 账户模块
pub mod account;

// 用户操作记录模块
pub mod activity;

// 配置管理模块
pub mod config;

// 日志系统
pub mod logging;

// Web服务器模块
pub mod server;

// 用户沙箱文件系统模块
pub mod filesystem;

// 导出常用类型
pub use account::{AccountError, AccountRecord, AccountStore};
pub use activity::{ActivityAction, ActivityEntry, ActivityLog};
pub use config::AppConfig;
pub use filesystem::{secure_filename, FileEntry, FileService, FsError, SandboxGuard};
pub use server::{build_router, ApiError, AppState};
