//! 进程内状态存储

use super::{StateStore, StoredRecord};
use crate::error::PlatformError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    record: StoredRecord,
    writes: u64,
    write_error: Option<PlatformError>,
}

/// 进程内状态存储（修订号为递增计数）
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以初始变量创建（视为已写入一次）
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                record: StoredRecord {
                    vars,
                    revision: Some("1".to_string()),
                },
                ..Default::default()
            }),
        }
    }

    /// 之后的写入全部返回该错误
    pub fn fail_writes(&self, error: PlatformError) {
        self.lock().write_error = Some(error);
    }

    pub fn snapshot(&self) -> StoredRecord {
        self.lock().record.clone()
    }

    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<StoredRecord, PlatformError> {
        Ok(self.snapshot())
    }

    async fn store(
        &self,
        vars: BTreeMap<String, String>,
        expected_revision: Option<&str>,
    ) -> Result<StoredRecord, PlatformError> {
        let mut inner = self.lock();
        if let Some(error) = inner.write_error.clone() {
            return Err(error);
        }

        let current = inner.record.revision.clone().unwrap_or_default();
        if let Some(expected) = expected_revision {
            if expected != current {
                return Err(PlatformError::Conflict(format!(
                    "expected revision '{}', found '{}'",
                    expected, current
                )));
            }
        }

        let next = current.parse::<u64>().unwrap_or(0) + 1;
        inner.record = StoredRecord {
            vars,
            revision: Some(next.to_string()),
        };
        inner.writes += 1;
        Ok(inner.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revision_increments() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().await.unwrap().revision, None);

        let first = store.store(BTreeMap::new(), None).await.unwrap();
        assert_eq!(first.revision.as_deref(), Some("1"));

        let second = store.store(BTreeMap::new(), Some("1")).await.unwrap();
        assert_eq!(second.revision.as_deref(), Some("2"));

        let err = store.store(BTreeMap::new(), Some("1")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
        assert_eq!(store.write_count(), 2);
    }
}
