//! 通知层 - 格式化单行消息并投递到 Discord Webhook
//!
//! # 使用示例
//! ```ignore
//! use switchbot_notify::notification::{DiscordWebhook, NotificationDispatcher, WebhookConfig};
//!
//! let transport = Arc::new(DiscordWebhook::new(WebhookConfig::default())?);
//! let dispatcher = NotificationDispatcher::new(transport);
//! dispatcher.notify(&url, &user_id, &content).await?;
//! ```

pub mod dispatcher;
pub mod formatter;
pub mod webhook;

use serde::Serialize;

/// 渲染后的消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    /// 被提及的 Discord 用户
    pub recipient_id: String,
    /// 单行正文
    pub body: String,
}

pub use dispatcher::{NotificationDispatcher, SendResult};
pub use formatter::{msg, MessageFormatter, NotificationContent};
pub use webhook::{DiscordWebhook, DispatchError, WebhookConfig, WebhookTransport};
