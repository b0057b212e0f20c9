// 账户存储
//
// 每个账户一个 JSON 文件：<accounts_dir>/<清洗后的用户名>.json

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::password::{constant_time_eq, hash_password, verify_password};
use super::types::{AccountError, AccountRecord, Credential};
use crate::filesystem::secure_filename;

const MISSING_FIELDS: &str = "Both username and password are required";

/// 账户存储
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts_dir: PathBuf,
}

impl AccountStore {
    pub fn new(accounts_dir: impl Into<PathBuf>) -> Self {
        Self {
            accounts_dir: accounts_dir.into(),
        }
    }

    /// 注册新账户
    ///
    /// 记录先写入临时文件，再以硬链接方式放到最终位置：
    /// 目标已存在时链接失败，两个并发注册不会互相覆盖。
    pub fn register(&self, username: &str, password: &str) -> Result<(), AccountError> {
        let (username, password) = require_fields(username, password)?;
        let path = self.record_path(username)?;

        if path.exists() {
            return Err(AccountError::AlreadyExists);
        }

        let record = AccountRecord::new(username, hash_password(password)?);
        fs::create_dir_all(&self.accounts_dir)?;

        let temp_path = self.write_temp(&path, &record)?;
        let linked = fs::hard_link(&temp_path, &path);
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!("删除账户临时文件失败: {:?}, 错误: {}", temp_path, e);
        }

        match linked {
            Ok(()) => {
                info!("✓ 账户已注册: {}", username);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AccountError::AlreadyExists),
            Err(e) => Err(AccountError::Io(e)),
        }
    }

    /// 校验登录凭证
    ///
    /// 记录中的用户名必须与提交的完全一致：两个不同用户名清洗后可能落到同一个文件，
    /// 这种别名不能登录到别人的账户。
    pub fn login(&self, username: &str, password: &str) -> Result<(), AccountError> {
        let (username, password) = require_fields(username, password)?;
        let path = self.record_path(username)?;

        let record = match self.load(&path)? {
            Some(record) => record,
            None => {
                debug!("登录失败，账户不存在: {}", username);
                return Err(AccountError::InvalidCredentials);
            }
        };

        if record.username != username {
            debug!("登录失败，用户名别名: {} -> {}", username, record.username);
            return Err(AccountError::InvalidCredentials);
        }

        let verified = match record.credential() {
            Some(Credential::Hashed(hash)) => verify_password(password, hash)?,
            Some(Credential::Legacy(plain)) => {
                let ok = constant_time_eq(plain.as_bytes(), password.as_bytes());
                if ok {
                    self.upgrade_legacy(&path, &record, password);
                }
                ok
            }
            None => {
                warn!("账户记录缺少凭证: {:?}", path);
                false
            }
        };

        if !verified {
            return Err(AccountError::InvalidCredentials);
        }

        info!("✓ 登录成功: {}", username);
        Ok(())
    }

    /// 账户是否存在（按清洗后的用户名）
    #[cfg(test)]
    fn exists(&self, username: &str) -> bool {
        self.record_path(username.trim())
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    fn record_path(&self, username: &str) -> Result<PathBuf, AccountError> {
        let token = secure_filename(username);
        if token.is_empty() {
            return Err(AccountError::Validation("Invalid username"));
        }
        Ok(self.accounts_dir.join(format!("{}.json", token)))
    }

    fn load(&self, path: &Path) -> Result<Option<AccountRecord>, AccountError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AccountError::Io(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_temp(&self, path: &Path, record: &AccountRecord) -> Result<PathBuf, AccountError> {
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut writer, record)
            .map_err(AccountError::from)
            .and_then(|_| writer.flush().map_err(AccountError::from))
            .and_then(|_| writer.get_ref().sync_all().map_err(AccountError::from));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(temp_path)
    }

    /// 明文记录登录成功后改写为哈希记录，失败只记日志
    fn upgrade_legacy(&self, path: &Path, legacy: &AccountRecord, password: &str) {
        let upgraded = hash_password(password).and_then(|hash| {
            let record = AccountRecord {
                password_hash: Some(hash),
                password: None,
                ..legacy.clone()
            };
            let temp_path = self.write_temp(path, &record)?;
            fs::rename(&temp_path, path).map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                AccountError::Io(e)
            })
        });

        match upgraded {
            Ok(()) => info!("旧版明文账户已升级为哈希存储: {}", legacy.username),
            Err(e) => warn!("升级旧版账户失败: {}, 错误: {}", legacy.username, e),
        }
    }
}

fn require_fields<'a>(username: &'a str, password: &'a str) -> Result<(&'a str, &'a str), AccountError> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::Validation(MISSING_FIELDS));
    }
    Ok((username, password))
}
