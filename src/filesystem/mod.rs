// 用户沙箱文件系统模块
//
// 每个用户拥有独立根目录，所有文件操作都先经过沙箱守卫解析路径

mod guard;
mod sanitize;
mod service;
mod types;

pub use guard::SandboxGuard;
pub use sanitize::secure_filename;
pub use service::{FileService, PendingUpload};
pub use types::*;
