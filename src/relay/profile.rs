//! 单元画像：触发外形、认证策略、设备表

use crate::auth::AuthPolicy;
use crate::config::UnitKind;
use crate::event::{DeviceAction, DeviceTable, DeviceType, TriggerShape};

/// 一个部署单元的固定行为
#[derive(Debug, Clone)]
pub struct UnitProfile {
    pub kind: UnitKind,
    pub shape: TriggerShape,
    pub policy: AuthPolicy,
    pub devices: DeviceTable,
    /// 是否按锁状态去重
    pub dedupe: bool,
}

impl UnitProfile {
    pub fn for_unit(kind: UnitKind) -> Self {
        match kind {
            UnitKind::KeyLock => Self {
                kind,
                shape: TriggerShape::Request,
                policy: AuthPolicy::InteractiveSigned,
                devices: DeviceTable::new(vec![
                    (DeviceType::WoLockPro, DeviceAction::Notify),
                    (DeviceType::WoLock, DeviceAction::Forward),
                    (DeviceType::WoHub2, DeviceAction::Ignore),
                ]),
                dedupe: true,
            },
            UnitKind::KeyLockBottom => Self {
                kind,
                shape: TriggerShape::Direct,
                policy: AuthPolicy::Scheduled,
                devices: DeviceTable::new(vec![(DeviceType::WoLock, DeviceAction::Notify)])
                    .with_implied(DeviceType::WoLock),
                dedupe: true,
            },
            UnitKind::Climate => Self {
                kind,
                shape: TriggerShape::Scheduled,
                policy: AuthPolicy::Scheduled,
                devices: DeviceTable::new(Vec::new()),
                dedupe: false,
            },
        }
    }

    /// 是否为定时拉取遥测的单元
    pub fn polls_telemetry(&self) -> bool {
        self.shape == TriggerShape::Scheduled
    }
}
