//! 设备状态事件 - 类型定义与校验
//!
//! 未信任的原始输入只在 [`EventValidator`] 内部以 `serde_json::Value` 形式出现，
//! 边界之外一律是 [`StatusEvent`]。

pub mod validator;

pub use validator::{validate_readings, EventValidator, TriggerShape};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 设备类型（线上名称即 SwitchBot 的 deviceType 字符串）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// 上の鍵
    WoLockPro,
    /// 下の鍵
    WoLock,
    /// 温湿度计所在的 Hub
    WoHub2,
}

impl DeviceType {
    pub fn parse(raw: &str) -> Option<DeviceType> {
        match raw {
            "WoLockPro" => Some(DeviceType::WoLockPro),
            "WoLock" => Some(DeviceType::WoLock),
            "WoHub2" => Some(DeviceType::WoHub2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::WoLockPro => "WoLockPro",
            DeviceType::WoLock => "WoLock",
            DeviceType::WoHub2 => "WoHub2",
        }
    }

    /// 通知中使用的类别名
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::WoLockPro => "上の鍵",
            DeviceType::WoLock => "下の鍵",
            DeviceType::WoHub2 => "スイッチハブ",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单元对某类设备的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    /// 本单元直接通知
    Notify,
    /// 转发给兄弟单元
    Forward,
    /// 接受但不处理
    Ignore,
}

impl DeviceAction {
    /// Notify/Forward 需要 battery 与 lockState
    pub fn is_actionable(&self) -> bool {
        !matches!(self, DeviceAction::Ignore)
    }
}

/// 单元可接受的设备表
#[derive(Debug, Clone)]
pub struct DeviceTable {
    entries: Vec<(DeviceType, DeviceAction)>,
    /// 缺少 deviceType 时采用的设备
    implied: Option<DeviceType>,
}

impl DeviceTable {
    pub fn new(entries: Vec<(DeviceType, DeviceAction)>) -> Self {
        Self {
            entries,
            implied: None,
        }
    }

    pub fn with_implied(mut self, device: DeviceType) -> Self {
        self.implied = Some(device);
        self
    }

    pub fn action_for(&self, device: DeviceType) -> Option<DeviceAction> {
        self.entries
            .iter()
            .find(|(d, _)| *d == device)
            .map(|(_, action)| *action)
    }

    pub fn implied(&self) -> Option<DeviceType> {
        self.implied
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 锁状态
#[derive(Debug, Clone, PartialEq)]
pub struct LockStatus {
    pub device: DeviceType,
    /// 0..=100
    pub battery: f64,
    /// 非空
    pub lock_state: String,
}

/// 温湿度读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// 校验后的事件
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Lock(LockStatus),
    Climate(ClimateReading),
    /// 非处理对象设备
    Ignored { device: DeviceType },
}

impl StatusEvent {
    pub fn device(&self) -> Option<DeviceType> {
        match self {
            StatusEvent::Lock(lock) => Some(lock.device),
            StatusEvent::Ignored { device } => Some(*device),
            StatusEvent::Climate(_) => None,
        }
    }
}

/// 校验结果：类型化事件 + 已校验的 context（转发时只传这一部分）
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub event: StatusEvent,
    pub context: Map<String, Value>,
}

impl ValidatedEvent {
    /// 转发给兄弟单元的载荷
    pub fn forward_payload(&self) -> Value {
        serde_json::json!({ "context": Value::Object(self.context.clone()) })
    }
}
