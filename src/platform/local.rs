//! 本机平台实现：环境变量身份 + 子进程调用

use super::{ExecutionContext, FunctionConfiguration, FunctionInvoker, IdentityService};
use crate::config::UnitKind;
use crate::error::PlatformError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

/// 执行身份所在的环境变量
pub const PRINCIPAL_ENV: &str = "EXECUTION_PRINCIPAL";

/// 从环境变量读取执行身份
#[derive(Debug, Default)]
pub struct EnvIdentity;

#[async_trait]
impl IdentityService for EnvIdentity {
    async fn caller_principal(&self) -> Result<String, PlatformError> {
        std::env::var(PRINCIPAL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PlatformError::Unavailable(format!("{} is not set", PRINCIPAL_ENV)))
    }
}

/// 固定身份
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

#[async_trait]
impl IdentityService for StaticIdentity {
    async fn caller_principal(&self) -> Result<String, PlatformError> {
        Ok(self.0.clone())
    }
}

/// 以子进程方式调用其他单元（`sbn handle --unit <unit>`，载荷走 stdin）
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: PathBuf,
    role: Option<String>,
}

impl ProcessInvoker {
    pub fn new(program: impl Into<PathBuf>, role: Option<String>) -> Self {
        Self {
            program: program.into(),
            role,
        }
    }

    /// 使用当前可执行文件
    pub fn current(role: Option<String>) -> Result<Self, PlatformError> {
        let program = std::env::current_exe()
            .map_err(|e| PlatformError::Unavailable(format!("cannot locate executable: {}", e)))?;
        Ok(Self::new(program, role))
    }

    fn resolve(function: &str) -> Result<UnitKind, PlatformError> {
        UnitKind::from_function_name(function)
            .ok_or_else(|| PlatformError::NotFound(function.to_string()))
    }
}

#[async_trait]
impl FunctionInvoker for ProcessInvoker {
    async fn probe(&self, function: &str) -> Result<FunctionConfiguration, PlatformError> {
        let unit = Self::resolve(function)?;
        Ok(FunctionConfiguration {
            function_name: unit.function_name().to_string(),
            role: self.role.clone(),
        })
    }

    async fn invoke_event(&self, function: &str, payload: &Value) -> Result<(), PlatformError> {
        let unit = Self::resolve(function)?;
        let body = serde_json::to_vec(payload)
            .map_err(|e| PlatformError::InvalidParameter(e.to_string()))?;
        let arn = ExecutionContext::local(unit.function_name()).invoked_function_arn;

        let mut child = Command::new(&self.program)
            .args(["handle", "--unit", unit.as_str(), "--function-arn", &arn])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| PlatformError::Unavailable(format!("spawn failed: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&body)
                .await
                .map_err(|e| PlatformError::Unavailable(format!("payload write failed: {}", e)))?;
            // 关闭 stdin，子进程才能读到 EOF
            drop(stdin);
        }

        info!(function = %function, pid = ?child.id(), "Dispatched event invocation");

        // 调用方不等待结果，后台回收子进程
        let function = function.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(function = %function, status = %status, "Event invocation exited with failure")
                }
                Ok(_) => {}
                Err(e) => warn!(function = %function, error = %e, "Failed to wait for event invocation"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity() {
        let identity = StaticIdentity("arn:aws:sts::1:assumed-role/role-X/fn".into());
        assert!(identity.caller_principal().await.unwrap().contains("role-X"));
    }

    #[tokio::test]
    async fn test_process_invoker_probe() {
        let invoker = ProcessInvoker::new("/nonexistent/sbn", Some("role".into()));
        let config = invoker.probe("sendKeyLockStatusBottom").await.unwrap();
        assert_eq!(config.function_name, "sendKeyLockStatusBottom");
        assert_eq!(config.role.as_deref(), Some("role"));

        assert_eq!(
            invoker.probe("unknownFunction").await.unwrap_err(),
            PlatformError::NotFound("unknownFunction".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_invoker_delivers_payload_on_stdin() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("payload.json");
        let script = dir.path().join("sbn");
        std::fs::write(&script, format!("#!/bin/sh\ncat > '{}'\n", out.display())).unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let invoker = ProcessInvoker::new(&script, None);
        let payload = serde_json::json!({"context": {"lockState": "locked"}});
        invoker.invoke_event("sendKeyLockStatusBottom", &payload).await.unwrap();

        // 调用立即返回，等待后台子进程写完
        let mut written = String::new();
        for _ in 0..100 {
            written = std::fs::read_to_string(&out).unwrap_or_default();
            if !written.is_empty() && serde_json::from_str::<Value>(&written).is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(serde_json::from_str::<Value>(&written).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_process_invoker_spawn_failure() {
        let invoker = ProcessInvoker::new("/nonexistent/sbn", None);
        let err = invoker
            .invoke_event("sendKeyLockStatusBottom", &serde_json::json!({"context": {}}))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable(_)));
    }
}
