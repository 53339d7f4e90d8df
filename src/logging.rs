//! 日志初始化与日志注入防护
//!
//! 所有来自请求、设备或上游的值在写入日志前都要经过 [`sanitize`]：
//! 换行/制表符转义、其余控制字符删除、超长截断。

use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

/// 默认日志值最大长度（字符数）
pub const DEFAULT_LOG_MAX_LENGTH: usize = 1000;

const TRUNCATED_SUFFIX: &str = "...[truncated]";
const MASK: &str = "***MASKED***";

static MAX_LENGTH: AtomicUsize = AtomicUsize::new(DEFAULT_LOG_MAX_LENGTH);
static CONTROL_CHARS: OnceLock<Regex> = OnceLock::new();

/// 初始化 tracing（stderr 输出；stdout 留给响应 JSON）
pub fn init(max_length: usize) {
    set_max_length(max_length);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("switchbot_notify=info,sbn=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// 设置日志值截断长度
pub fn set_max_length(max_length: usize) {
    MAX_LENGTH.store(max_length.max(1), Ordering::Relaxed);
}

fn control_chars() -> &'static Regex {
    CONTROL_CHARS.get_or_init(|| {
        Regex::new(r"[\x00-\x1F\x7F-\x{9F}]").expect("control character pattern is valid")
    })
}

/// 日志注入防护，使用全局截断长度
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, MAX_LENGTH.load(Ordering::Relaxed))
}

/// 日志注入防护
pub fn sanitize_with_limit(input: &str, max_length: usize) -> String {
    let escaped = input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    let stripped = control_chars().replace_all(&escaped, "");

    if stripped.chars().count() > max_length {
        let mut truncated: String = stripped.chars().take(max_length).collect();
        truncated.push_str(TRUNCATED_SUFFIX);
        truncated
    } else {
        stripped.into_owned()
    }
}

/// 可选值的日志形式（缺失时为 `None`）
pub fn sanitize_opt(input: Option<&str>) -> String {
    match input {
        Some(v) => sanitize(v),
        None => "None".to_string(),
    }
}

/// 遮蔽敏感字段（键名大小写不敏感，递归处理对象和数组）
pub fn mask_sensitive(data: &Value, keys_to_mask: &[&str]) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let masked = if keys_to_mask.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                        Value::String(MASK.to_string())
                    } else {
                        mask_sensitive(value, keys_to_mask)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| mask_sensitive(item, keys_to_mask))
                .collect(),
        ),
        other => other.clone(),
    }
}
