//! 本地 JSON 文件状态存储（写锁 + 临时文件原子替换）

use super::{StateStore, StoredRecord};
use crate::config::UnitKind;
use crate::error::PlatformError;
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// 磁盘格式
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileRecord {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

/// 文件状态存储
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 单元默认位置：`<config_dir>/switchbot-notify/units/<function>.json`
    pub fn for_unit(unit: UnitKind) -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("switchbot-notify")
            .join("units")
            .join(format!("{}.json", unit.function_name()));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> Result<FileRecord, PlatformError> {
        if content.trim().is_empty() {
            return Ok(FileRecord::default());
        }
        serde_json::from_str(content)
            .map_err(|e| PlatformError::InvalidParameter(format!("corrupt state file: {}", e)))
    }

    fn to_snapshot(record: FileRecord) -> StoredRecord {
        StoredRecord {
            revision: (record.revision > 0).then(|| record.revision.to_string()),
            vars: record.variables,
        }
    }

    /// 写锁文件：与数据文件同目录，数据文件本身会被 rename 替换
    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn read_current(&self) -> Result<FileRecord, PlatformError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileRecord::default()),
            Err(e) => Err(io_error(e)),
        }
    }

    fn write_locked(
        &self,
        vars: BTreeMap<String, String>,
        expected_revision: Option<&str>,
    ) -> Result<StoredRecord, PlatformError> {
        let current = self.read_current()?;

        if let Some(expected) = expected_revision {
            let found = if current.revision > 0 {
                current.revision.to_string()
            } else {
                String::new()
            };
            if found != expected {
                return Err(PlatformError::Conflict(format!(
                    "expected revision '{}', found '{}'",
                    expected, found
                )));
            }
        }

        let next = FileRecord {
            revision: current.revision + 1,
            variables: vars,
        };
        let serialized = serde_json::to_string_pretty(&next)
            .map_err(|e| PlatformError::InvalidParameter(e.to_string()))?;

        // 写入临时文件
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path).map_err(io_error)?;
            temp_file.write_all(serialized.as_bytes()).map_err(io_error)?;
            temp_file.sync_all().map_err(io_error)?;
        }

        // 原子替换，读者只会看到旧记录或新记录
        fs::rename(&temp_path, &self.path).map_err(io_error)?;
        Ok(Self::to_snapshot(next))
    }
}

fn io_error(e: std::io::Error) -> PlatformError {
    PlatformError::Unavailable(format!("state file io: {}", e))
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<StoredRecord, PlatformError> {
        Ok(Self::to_snapshot(self.read_current()?))
    }

    async fn store(
        &self,
        vars: BTreeMap<String, String>,
        expected_revision: Option<&str>,
    ) -> Result<StoredRecord, PlatformError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(io_error)?;

        lock.lock_exclusive().map_err(io_error)?;

        let result = self.write_locked(vars, expected_revision);
        let _ = lock.unlock();
        result
    }
}
