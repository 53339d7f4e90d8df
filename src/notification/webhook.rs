//! Discord Webhook 客户端
//!
//! POST `{"content": "..."}`，2xx 视为成功，不重试。

use super::NotificationMessage;
use crate::error::RelayError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// 默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 投递失败类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("webhook request timed out")]
    Timeout,
    #[error("webhook transport error: {0}")]
    Transport(String),
    #[error("webhook rejected with status {0}")]
    ServerRejected(u16),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout
        } else if let Some(status) = e.status() {
            DispatchError::ServerRejected(status.as_u16())
        } else {
            DispatchError::Transport(e.to_string())
        }
    }
}

impl From<DispatchError> for RelayError {
    fn from(e: DispatchError) -> Self {
        RelayError::Upstream(e.to_string())
    }
}

/// Webhook 请求载荷
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
}

/// Webhook 传输层
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, message: &NotificationMessage) -> Result<(), DispatchError>;
}

/// Webhook 客户端配置
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 超时时间
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Discord Webhook 客户端
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
}

impl DiscordWebhook {
    pub fn new(config: WebhookConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for DiscordWebhook {
    async fn post(&self, url: &str, message: &NotificationMessage) -> Result<(), DispatchError> {
        let payload = WebhookPayload {
            content: &message.body,
        };

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::ServerRejected(status.as_u16()));
        }
        Ok(())
    }
}
