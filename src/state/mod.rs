//! 设备状态协调 - 去重判断与通知成功后的状态提交
//!
//! 状态保存在单元自身的配置记录里（扁平 key -> String）。
//! 提交是读-改-写：并发调用可能互相覆盖（last writer wins），
//! `CommitMode::CompareAndSwap` 以修订号为前提条件，冲突时提交失败。

pub mod file_store;
pub mod memory;

pub use file_store::FileStateStore;
pub use memory::MemoryStateStore;

use crate::error::PlatformError;
use crate::logging::sanitize;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// 上次通知状态所在的键
pub const KEY_STATE: &str = "KEY_STATE";
/// 提交时一并写回的投递参数
pub const KEY_WEBHOOK_URL: &str = "URL";
pub const KEY_RECIPIENT: &str = "USER_ID";

/// 配置记录快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    pub vars: BTreeMap<String, String>,
    /// 不透明修订号；从未写入过时为 None
    pub revision: Option<String>,
}

/// 状态存储
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 读取整条记录（不存在时返回空记录）
    async fn load(&self) -> Result<StoredRecord, PlatformError>;

    /// 整条写回；`expected_revision` 为 Some 时修订号不符返回 `PlatformError::Conflict`
    async fn store(
        &self,
        vars: BTreeMap<String, String>,
        expected_revision: Option<&str>,
    ) -> Result<StoredRecord, PlatformError>;
}

/// 提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// 直接覆盖
    #[default]
    Overwrite,
    /// 以去重检查时读到的修订号为前提
    CompareAndSwap,
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(CommitMode::Overwrite),
            "compare-and-swap" | "cas" => Ok(CommitMode::CompareAndSwap),
            other => Err(format!("unknown commit mode '{}'", other)),
        }
    }
}

/// 提交时写回的投递参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContext {
    pub webhook_url: String,
    pub recipient_id: String,
}

/// 去重检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCheck {
    pub device_key: String,
    pub stored_state: String,
    pub new_state: String,
    pub revision: Option<String>,
}

impl StateCheck {
    /// 唯一的去重规则：字符串完全相等
    pub fn should_notify(&self) -> bool {
        self.stored_state != self.new_state
    }
}

/// 状态协调器
pub struct StateCoordinator {
    store: Arc<dyn StateStore>,
    mode: CommitMode,
}

impl StateCoordinator {
    pub fn new(store: Arc<dyn StateStore>, mode: CommitMode) -> Self {
        Self { store, mode }
    }

    /// 读取存储状态并与新状态比较
    pub async fn check(&self, device_key: &str, new_state: &str) -> Result<StateCheck, PlatformError> {
        let record = self.store.load().await?;
        let stored_state = record.vars.get(device_key).cloned().unwrap_or_default();

        Ok(StateCheck {
            device_key: device_key.to_string(),
            stored_state,
            new_state: new_state.to_string(),
            revision: record.revision,
        })
    }

    pub async fn should_notify(&self, device_key: &str, new_state: &str) -> Result<bool, PlatformError> {
        Ok(self.check(device_key, new_state).await?.should_notify())
    }

    /// 通知成功后提交新状态（合并写入，保留无关键）
    pub async fn commit(&self, check: &StateCheck, delivery: &DeliveryContext) -> Result<(), PlatformError> {
        let current = self.store.load().await?;

        let expected = match self.mode {
            CommitMode::Overwrite => None,
            CommitMode::CompareAndSwap => {
                if current.revision != check.revision {
                    warn!(
                        device_key = %sanitize(&check.device_key),
                        "State changed since dedupe check, refusing to overwrite"
                    );
                    return Err(PlatformError::Conflict(format!(
                        "revision moved from {:?} to {:?}",
                        check.revision, current.revision
                    )));
                }
                Some(current.revision.clone().unwrap_or_default())
            }
        };

        let mut vars = current.vars;
        vars.insert(check.device_key.clone(), check.new_state.clone());
        vars.insert(KEY_WEBHOOK_URL.to_string(), delivery.webhook_url.clone());
        vars.insert(KEY_RECIPIENT.to_string(), delivery.recipient_id.clone());

        let written = self.store.store(vars, expected.as_deref()).await?;
        info!(
            device_key = %sanitize(&check.device_key),
            new_state = %sanitize(&check.new_state),
            revision = ?written.revision,
            "Device state committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> DeliveryContext {
        DeliveryContext {
            webhook_url: "https://discord.com/api/webhooks/1/x".to_string(),
            recipient_id: "42".to_string(),
        }
    }

    #[test]
    fn test_commit_mode_parse() {
        assert_eq!("overwrite".parse::<CommitMode>().unwrap(), CommitMode::Overwrite);
        assert_eq!("CAS".parse::<CommitMode>().unwrap(), CommitMode::CompareAndSwap);
        assert!("lock".parse::<CommitMode>().is_err());
    }

    #[tokio::test]
    async fn test_first_observation_notifies() {
        let store = Arc::new(MemoryStateStore::new());
        let coordinator = StateCoordinator::new(store, CommitMode::Overwrite);
        assert!(coordinator.should_notify(KEY_STATE, "locked").await.unwrap());
    }

    #[tokio::test]
    async fn test_equal_state_is_deduped() {
        let store = Arc::new(MemoryStateStore::with_vars([(KEY_STATE, "locked")]));
        let coordinator = StateCoordinator::new(store, CommitMode::Overwrite);
        assert!(!coordinator.should_notify(KEY_STATE, "locked").await.unwrap());
        assert!(coordinator.should_notify(KEY_STATE, "Locked").await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_merges_and_preserves_unrelated_keys() {
        let store = Arc::new(MemoryStateStore::with_vars([
            (KEY_STATE, "unlocked"),
            ("OTHER", "keep-me"),
        ]));
        let coordinator = StateCoordinator::new(store.clone(), CommitMode::Overwrite);

        let check = coordinator.check(KEY_STATE, "locked").await.unwrap();
        coordinator.commit(&check, &delivery()).await.unwrap();

        let record = store.snapshot();
        assert_eq!(record.vars[KEY_STATE], "locked");
        assert_eq!(record.vars["OTHER"], "keep-me");
        assert_eq!(record.vars[KEY_RECIPIENT], "42");
        assert_eq!(record.vars[KEY_WEBHOOK_URL], "https://discord.com/api/webhooks/1/x");
    }

    #[tokio::test]
    async fn test_overwrite_mode_last_writer_wins() {
        let store = Arc::new(MemoryStateStore::new());
        let coordinator = StateCoordinator::new(store.clone(), CommitMode::Overwrite);

        // 两个并发调用都读到了旧状态
        let first = coordinator.check(KEY_STATE, "locked").await.unwrap();
        let second = coordinator.check(KEY_STATE, "unlocked").await.unwrap();
        assert!(first.should_notify() && second.should_notify());

        coordinator.commit(&first, &delivery()).await.unwrap();
        coordinator.commit(&second, &delivery()).await.unwrap();
        assert_eq!(store.snapshot().vars[KEY_STATE], "unlocked");
    }

    #[tokio::test]
    async fn test_cas_mode_rejects_stale_commit() {
        let store = Arc::new(MemoryStateStore::new());
        let coordinator = StateCoordinator::new(store.clone(), CommitMode::CompareAndSwap);

        let first = coordinator.check(KEY_STATE, "locked").await.unwrap();
        let second = coordinator.check(KEY_STATE, "unlocked").await.unwrap();

        coordinator.commit(&first, &delivery()).await.unwrap();
        let err = coordinator.commit(&second, &delivery()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
        assert_eq!(store.snapshot().vars[KEY_STATE], "locked");
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStateStore::new());
        store.fail_writes(PlatformError::AccessDenied("update".into()));
        let coordinator = StateCoordinator::new(store.clone(), CommitMode::Overwrite);

        let check = coordinator.check(KEY_STATE, "locked").await.unwrap();
        let err = coordinator.commit(&check, &delivery()).await.unwrap_err();
        assert!(matches!(err, PlatformError::AccessDenied(_)));
        assert!(store.snapshot().vars.is_empty());
    }
}
