//! 消息格式化 - 单行 Discord 消息
//!
//! 格式：
//! - 锁：`<@{user}> {类别}の状態：{lockState}, 電池残量：{battery}`
//! - 温湿度：`<@{user}> 気温：{temperature} ℃, 湿度：{humidity}%`

use super::NotificationMessage;
use crate::event::ClimateReading;

/// 通知文案常量
pub mod msg {
    pub const STATE_SUFFIX: &str = "の状態";
    pub const BATTERY: &str = "電池残量";
    pub const TEMPERATURE: &str = "気温";
    pub const HUMIDITY: &str = "湿度";
}

/// 通知内容
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationContent {
    Lock {
        /// 类别名（上の鍵 / 下の鍵）
        label: String,
        lock_state: String,
        battery: f64,
    },
    Climate(ClimateReading),
}

impl NotificationContent {
    /// 日志中使用的类别
    pub fn category(&self) -> &str {
        match self {
            NotificationContent::Lock { label, .. } => label,
            NotificationContent::Climate(_) => "climate",
        }
    }
}

/// 消息格式化器
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn format(recipient_id: &str, content: &NotificationContent) -> NotificationMessage {
        let body = match content {
            NotificationContent::Lock {
                label,
                lock_state,
                battery,
            } => format!(
                "{} {}{}：{}, {}：{}",
                Self::mention(recipient_id),
                label,
                msg::STATE_SUFFIX,
                lock_state,
                msg::BATTERY,
                battery
            ),
            NotificationContent::Climate(reading) => format!(
                "{} {}：{} ℃, {}：{}%",
                Self::mention(recipient_id),
                msg::TEMPERATURE,
                reading.temperature,
                msg::HUMIDITY,
                reading.humidity
            ),
        };

        NotificationMessage {
            recipient_id: recipient_id.to_string(),
            body,
        }
    }

    fn mention(recipient_id: &str) -> String {
        format!("<@{}>", recipient_id)
    }
}
