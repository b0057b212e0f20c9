// 账户模块
//
// 用户名 + 密码注册/登录，凭证以 Argon2id 哈希落盘

pub mod password;
mod store;
mod types;

pub use store::AccountStore;
pub use types::{AccountError, AccountRecord, Credential};
