//! SwitchBot Cloud API 客户端
//!
//! 每个请求都带签名头：`sign = base64(HMAC-SHA256(secret, token + t + nonce))`，
//! `t` 为毫秒时间戳，`nonce` 为 UUID v4。

use crate::config::TelemetryConfig;
use crate::error::RelayError;
use crate::logging::{mask_sensitive, sanitize};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

type HmacSha256 = Hmac<Sha256>;

/// Webhook 注册端点
pub const SETUP_WEBHOOK_URL: &str = "https://api.switch-bot.com/v1.1/webhook/setupWebhook";

/// 请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 日志中需要遮蔽的字段
const SENSITIVE_KEYS: &[&str] = &["token", "secret", "authorization"];

/// SwitchBot API 错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("switchbot request timed out")]
    Timeout,
    #[error("switchbot transport error: {0}")]
    Transport(String),
    #[error("switchbot returned status {0}")]
    Status(u16),
    #[error("switchbot response invalid: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TelemetryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TelemetryError::Timeout
        } else if let Some(status) = e.status() {
            TelemetryError::Status(status.as_u16())
        } else if e.is_decode() {
            TelemetryError::InvalidResponse(e.to_string())
        } else {
            TelemetryError::Transport(e.to_string())
        }
    }
}

impl From<TelemetryError> for RelayError {
    fn from(e: TelemetryError) -> Self {
        RelayError::Upstream(e.to_string())
    }
}

/// 计算签名
pub fn sign(token: &str, secret: &str, t: i64, nonce: &str) -> Result<String, TelemetryError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TelemetryError::Transport(format!("invalid signing key: {}", e)))?;
    mac.update(format!("{}{}{}", token, t, nonce).as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// 以给定时间戳和 nonce 构造请求头
pub fn signed_headers_at(token: &str, secret: &str, t: i64, nonce: &str) -> Result<HeaderMap, TelemetryError> {
    let pairs = [
        ("authorization", token.to_string()),
        ("content-type", "application/json".to_string()),
        ("charset", "utf-8".to_string()),
        ("t", t.to_string()),
        ("sign", sign(token, secret, t, nonce)?),
        ("nonce", nonce.to_string()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(&value)
            .map_err(|_| TelemetryError::Transport(format!("invalid value for header '{}'", name)))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

/// 以当前时间和新 nonce 构造请求头
pub fn signed_headers(token: &str, secret: &str) -> Result<HeaderMap, TelemetryError> {
    let t = chrono::Utc::now().timestamp_millis();
    let nonce = uuid::Uuid::new_v4().to_string();
    signed_headers_at(token, secret, t, &nonce)
}

/// 设备遥测来源
#[async_trait]
pub trait DeviceTelemetry: Send + Sync {
    /// 返回设备状态响应中的 `body`
    async fn device_status(&self) -> Result<Value, TelemetryError>;
}

/// SwitchBot API 客户端
#[derive(Debug, Clone)]
pub struct SwitchBotClient {
    client: Client,
    token: String,
    secret: String,
}

impl SwitchBotClient {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Result<Self, TelemetryError> {
        Self::with_timeout(token, secret, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        token: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token: token.into(),
            secret: secret.into(),
        })
    }

    /// `GET {base_url}{device_id}/status`，返回 `body`
    pub async fn get_status(&self, base_url: &str, device_id: &str) -> Result<Value, TelemetryError> {
        let url = format!("{}{}/status", base_url, device_id);
        info!(url = %sanitize(&url), "SwitchBot status request");

        let response = self
            .client
            .get(&url)
            .headers(signed_headers(&self.token, &self.secret)?)
            .send()
            .await
            .map_err(|e| Self::log_failure("status", e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::log_failure("status", TelemetryError::Status(status.as_u16())));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| Self::log_failure("status", TelemetryError::InvalidResponse(e.to_string())))?;

        let masked = mask_sensitive(&data, SENSITIVE_KEYS);
        info!(response = %sanitize(&masked.to_string()), "SwitchBot status received");

        match data {
            Value::Object(mut map) => map.remove("body").ok_or_else(|| {
                Self::log_failure("status", TelemetryError::InvalidResponse("missing 'body'".to_string()))
            }),
            _ => Err(Self::log_failure(
                "status",
                TelemetryError::InvalidResponse("response is not an object".to_string()),
            )),
        }
    }

    /// 向 SwitchBot 注册 Webhook 地址（所有设备）
    pub async fn setup_webhook(&self, endpoint: &str, webhook_url: &str) -> Result<Value, TelemetryError> {
        let payload = json!({
            "action": "setupWebhook",
            "url": webhook_url,
            "deviceList": "ALL",
        });

        let response = self
            .client
            .post(endpoint)
            .headers(signed_headers(&self.token, &self.secret)?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::log_failure("setupWebhook", e.into()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Self::log_failure("setupWebhook", TelemetryError::Status(status.as_u16())));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| Self::log_failure("setupWebhook", TelemetryError::InvalidResponse(e.to_string())))?;
        info!(
            response = %sanitize(&mask_sensitive(&data, SENSITIVE_KEYS).to_string()),
            "Webhook registered"
        );
        Ok(data)
    }

    fn log_failure(operation: &str, e: TelemetryError) -> TelemetryError {
        error!(operation = operation, error = %sanitize(&e.to_string()), "SwitchBot request failed");
        e
    }
}

/// 绑定到单个设备的遥测来源
#[derive(Debug, Clone)]
pub struct SwitchBotTelemetry {
    client: SwitchBotClient,
    base_url: String,
    device_id: String,
}

impl SwitchBotTelemetry {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            client: SwitchBotClient::new(&config.token, &config.secret)?,
            base_url: config.base_url.clone(),
            device_id: config.device_id.clone(),
        })
    }
}

#[async_trait]
impl DeviceTelemetry for SwitchBotTelemetry {
    async fn device_status(&self) -> Result<Value, TelemetryError> {
        self.client.get_status(&self.base_url, &self.device_id).await
    }
}
