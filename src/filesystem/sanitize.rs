// 文件名清洗
//
// 用户名、文件夹名、上传文件名在落盘前都经过同一套规则，
// 保证结果只包含 [A-Za-z0-9_.-] 且不含路径分隔符。

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Windows 保留设备名，即使在 Unix 上存储也避开，方便数据目录跨平台迁移
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("常量正则"))
}

/// 将任意名称转换为文件系统安全的标记
///
/// 1. NFKD 分解后丢弃非 ASCII 字符（带重音的字母保留基本字母）
/// 2. 路径分隔符替换为空白
/// 3. 按空白切分后用 `_` 连接
/// 4. 删除 `[A-Za-z0-9_.-]` 以外的字符
/// 5. 去掉首尾的 `.` 和 `_`
/// 6. 保留设备名加 `_` 前缀
///
/// 结果可能为空字符串，调用方需自行判空。
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let stripped = unsafe_chars().replace_all(&joined, "");
    let trimmed = stripped.trim_matches(|c| c == '.' || c == '_');

    if is_reserved(trimmed) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default();
    RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}
