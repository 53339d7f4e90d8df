//! 通知分发器 - 格式化并投递到 Webhook

use super::formatter::{MessageFormatter, NotificationContent};
use super::webhook::{DispatchError, WebhookTransport};
use crate::logging::sanitize;
use std::sync::Arc;
use tracing::{error, info};

/// 投递结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（dry-run）
    Skipped(String),
}

/// 通知分发器
pub struct NotificationDispatcher {
    transport: Arc<dyn WebhookTransport>,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 格式化并发送；失败原样返回给调用方
    pub async fn notify(
        &self,
        webhook_url: &str,
        recipient_id: &str,
        content: &NotificationContent,
    ) -> Result<SendResult, DispatchError> {
        let message = MessageFormatter::format(recipient_id, content);
        let category = sanitize(content.category());

        if self.dry_run {
            info!(category = %category, body = %sanitize(&message.body), "[DRY-RUN] Would send notification");
            return Ok(SendResult::Skipped("dry-run".to_string()));
        }

        info!(category = %category, "Sending notification");
        match self.transport.post(webhook_url, &message).await {
            Ok(()) => {
                info!(category = %category, "Notification sent");
                Ok(SendResult::Sent)
            }
            Err(e) => {
                error!(category = %category, error = %sanitize(&e.to_string()), "Notification failed");
                Err(e)
            }
        }
    }
}
