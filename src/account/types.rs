// 账户数据类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 账户错误
///
/// 用户名不存在与密码错误使用同一个变体，避免暴露用户名是否已注册
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Username already exists")]
    AlreadyExists,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Failed to access account data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupted account record: {0}")]
    Corrupted(#[from] serde_json::Error),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// 落盘的账户记录
///
/// 新记录只写 `password_hash`；早期版本写入的是明文 `password`，
/// 登录成功后会被改写为哈希形式。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    /// 注册时提交的用户名（去除首尾空白，区分大小写）
    pub username: String,
    /// Argon2id PHC 字符串
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// 旧版明文密码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 记录中保存的凭证形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Hashed(&'a str),
    Legacy(&'a str),
}

impl AccountRecord {
    pub fn new(username: impl Into<String>, password_hash: String) -> Self {
        Self {
            username: username.into(),
            password_hash: Some(password_hash),
            password: None,
            created_at: Some(Utc::now()),
        }
    }

    /// 哈希优先；两者都没有时返回 None
    pub fn credential(&self) -> Option<Credential<'_>> {
        match (&self.password_hash, &self.password) {
            (Some(hash), _) => Some(Credential::Hashed(hash)),
            (None, Some(plain)) => Some(Credential::Legacy(plain)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_parses() {
        let record: AccountRecord =
            serde_json::from_str(r#"{"username": "alice", "password": "hunter2"}"#).unwrap();
        assert_eq!(record.credential(), Some(Credential::Legacy("hunter2")));
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_new_record_has_no_plaintext() {
        let record = AccountRecord::new("alice", "$argon2id$v=19$stub".to_string());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"password\""));
        assert!(json.contains("password_hash"));
        assert_eq!(
            record.credential(),
            Some(Credential::Hashed("$argon2id$v=19$stub"))
        );
    }

    #[test]
    fn test_unknown_and_wrong_password_share_message() {
        assert_eq!(
            AccountError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
    }
}
