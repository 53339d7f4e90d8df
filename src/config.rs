//! 单元配置 - 从环境变量风格的键值加载并校验
//!
//! 加载通过 lookup 闭包完成，生产环境读取进程环境，测试注入 HashMap。

use crate::error::ConfigError;
use crate::state::CommitMode;
use reqwest::Url;
use std::collections::HashMap;

/// 默认请求最大时效（秒）
pub const DEFAULT_MAX_REQUEST_AGE: i64 = 300;
/// 默认的下游兄弟函数
pub const DEFAULT_SIBLING_FUNCTION: &str = "sendKeyLockStatusBottom";

/// 部署单元种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum UnitKind {
    /// 接收 SwitchBot Webhook 推送的锁状态（上の鍵），WoLock 转发给兄弟单元
    KeyLock,
    /// 由兄弟单元直接调用的下の鍵通知
    KeyLockBottom,
    /// 定时拉取温湿度
    Climate,
}

impl UnitKind {
    pub const ALL: [UnitKind; 3] = [UnitKind::KeyLock, UnitKind::KeyLockBottom, UnitKind::Climate];

    /// 部署后的函数名
    pub fn function_name(&self) -> &'static str {
        match self {
            UnitKind::KeyLock => "sendKeyLockStatus",
            UnitKind::KeyLockBottom => "sendKeyLockStatusBottom",
            UnitKind::Climate => "sendTemperaturHumidity",
        }
    }

    /// 由函数名（或 ARN 末段）反查单元
    pub fn from_function_name(name: &str) -> Option<UnitKind> {
        let short = name.rsplit(':').next().unwrap_or(name);
        Self::ALL.into_iter().find(|k| k.function_name() == short)
    }

    /// CLI 中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::KeyLock => "key-lock",
            UnitKind::KeyLockBottom => "key-lock-bottom",
            UnitKind::Climate => "climate",
        }
    }

    fn default_expected_role(&self) -> &'static str {
        match self {
            UnitKind::KeyLock | UnitKind::KeyLockBottom => "role-SendKeyStatusToDiscord",
            UnitKind::Climate => "role-SendTemperaturHumidityToDiscord",
        }
    }

    fn webhook_key(&self) -> &'static str {
        match self {
            UnitKind::KeyLock | UnitKind::KeyLockBottom => "URL",
            UnitKind::Climate => "DISCORD",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SwitchBot 遥测接口凭据（仅 Climate 单元）
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub device_id: String,
    pub token: String,
    pub secret: String,
    /// 形如 `https://api.switch-bot.com/v1.1/devices/`
    pub base_url: String,
}

/// 单元配置
#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub kind: UnitKind,
    pub webhook_url: String,
    pub recipient_id: String,
    /// 为空表示不限制来源 IP
    pub allowed_source_ips: Vec<String>,
    pub max_request_age: i64,
    /// 设置后启用请求签名校验
    pub webhook_secret: Option<String>,
    pub sibling_function: String,
    pub expected_role: String,
    pub commit_mode: CommitMode,
    pub log_max_length: usize,
    pub telemetry: Option<TelemetryConfig>,
}

impl UnitConfig {
    /// 从进程环境加载
    pub fn from_env(kind: UnitKind) -> Result<Self, ConfigError> {
        Self::load(kind, |key| std::env::var(key).ok())
    }

    /// 从键值表加载（测试用）
    pub fn from_map(kind: UnitKind, vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(kind, |key| vars.get(key).cloned())
    }

    /// 加载并校验配置
    pub fn load<F>(kind: UnitKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let webhook_key = kind.webhook_key();
        let mut required = vec![webhook_key, "USER_ID"];
        if kind == UnitKind::Climate {
            required.extend(["DEVICE_ID", "TOKEN", "SECRET", "SWITCHBOT"]);
        }

        let missing: Vec<String> = required
            .into_iter()
            .filter(|key| non_empty(*key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let webhook_url = non_empty(webhook_key).unwrap_or_default();
        if !is_valid_discord_webhook_url(&webhook_url) {
            return Err(ConfigError::Invalid {
                key: webhook_key.to_string(),
                reason: "not a discord webhook url".to_string(),
            });
        }

        let telemetry = if kind == UnitKind::Climate {
            let base_url = non_empty("SWITCHBOT").unwrap_or_default();
            if !is_valid_https_url(&base_url) {
                return Err(ConfigError::Invalid {
                    key: "SWITCHBOT".to_string(),
                    reason: "not an https url".to_string(),
                });
            }
            Some(TelemetryConfig {
                device_id: non_empty("DEVICE_ID").unwrap_or_default(),
                token: non_empty("TOKEN").unwrap_or_default(),
                secret: non_empty("SECRET").unwrap_or_default(),
                base_url,
            })
        } else {
            None
        };

        let max_request_age = match non_empty("MAX_REQUEST_AGE") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "MAX_REQUEST_AGE".to_string(),
                    reason: "expected a non-negative integer".to_string(),
                })?,
            None => DEFAULT_MAX_REQUEST_AGE,
        };

        let log_max_length = match non_empty("LOG_MAX_LENGTH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "LOG_MAX_LENGTH".to_string(),
                    reason: "expected a positive integer".to_string(),
                })?,
            None => crate::logging::DEFAULT_LOG_MAX_LENGTH,
        };

        let commit_mode = match non_empty("STATE_COMMIT_MODE") {
            Some(raw) => raw.trim().parse::<CommitMode>().map_err(|reason| ConfigError::Invalid {
                key: "STATE_COMMIT_MODE".to_string(),
                reason,
            })?,
            None => CommitMode::default(),
        };

        Ok(Self {
            kind,
            webhook_url,
            recipient_id: non_empty("USER_ID").unwrap_or_default(),
            allowed_source_ips: parse_allowlist(lookup("ALLOWED_SOURCE_IPS").as_deref()),
            max_request_age,
            webhook_secret: non_empty("WEBHOOK_SECRET"),
            sibling_function: non_empty("SIBLING_FUNCTION")
                .unwrap_or_else(|| DEFAULT_SIBLING_FUNCTION.to_string()),
            expected_role: non_empty("EXPECTED_ROLE")
                .unwrap_or_else(|| kind.default_expected_role().to_string()),
            commit_mode,
            log_max_length,
            telemetry,
        })
    }
}

/// 解析逗号分隔的 IP 白名单（空白项忽略）
pub fn parse_allowlist(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Discord Webhook URL 校验：https、主机含 discord.com、路径含 /api/webhooks/
pub fn is_valid_discord_webhook_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.scheme() == "https"
                && parsed.host_str().is_some_and(|h| h.contains("discord.com"))
                && parsed.path().contains("/api/webhooks/")
        }
        Err(_) => false,
    }
}

/// https 且有主机名
pub fn is_valid_https_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "https" && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
