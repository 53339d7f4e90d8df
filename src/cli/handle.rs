//! handle 命令 - 在本机执行一次单元调用
//!
//! 触发事件从文件或 stdin 读取，响应 JSON 写到 stdout，日志写到 stderr。

use super::output::format_output;
use crate::config::UnitKind;
use crate::notification::{DiscordWebhook, WebhookConfig};
use crate::platform::local::PRINCIPAL_ENV;
use crate::platform::{EnvIdentity, ExecutionContext, ProcessInvoker};
use crate::relay::{Collaborators, ConfigSource, InvocationResponse, Relay, UnitProfile};
use crate::state::FileStateStore;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// handle 命令参数
#[derive(Args)]
pub struct HandleArgs {
    /// Unit to run
    #[arg(long, value_enum)]
    pub unit: UnitKind,

    /// Trigger event JSON file ("-" for stdin); climate defaults to an empty event
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// Invoked function ARN (defaults to a local ARN for the unit)
    #[arg(long)]
    pub function_arn: Option<String>,

    /// Override the state file location
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Format and log the notification without sending or committing
    #[arg(long)]
    pub dry_run: bool,

    /// Pretty-print the response
    #[arg(long)]
    pub pretty: bool,
}

/// 读取触发事件
///
/// 内容不是 JSON 时原样作为字符串事件交给中继，由校验阶段以 400 拒绝。
pub fn read_trigger(unit: UnitKind, event: Option<&PathBuf>) -> Result<Value> {
    let raw = match event {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))?,
        None if unit == UnitKind::Climate => return Ok(Value::Object(Default::default())),
        // "-" 或未指定：读 stdin（兄弟单元转发的载荷也走这里）
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };

    match serde_json::from_str(&raw) {
        Ok(trigger) => Ok(trigger),
        Err(e) => {
            warn!(error = %e, "Trigger event is not valid JSON");
            Ok(Value::String(raw))
        }
    }
}

/// 处理 handle 命令，返回响应
pub async fn handle_invocation(args: HandleArgs) -> Result<InvocationResponse> {
    let trigger = read_trigger(args.unit, args.event.as_ref())?;

    let execution = match &args.function_arn {
        Some(arn) => ExecutionContext::new(arn.clone()),
        None => ExecutionContext::local(args.unit.function_name()),
    };

    let store = match &args.state_file {
        Some(path) => FileStateStore::new(path),
        None => FileStateStore::for_unit(args.unit),
    };

    // 本机没有函数配置服务，执行身份即视为执行角色
    let role = std::env::var(PRINCIPAL_ENV).ok().filter(|v| !v.trim().is_empty());

    let deps = Collaborators {
        identity: Arc::new(EnvIdentity),
        state: Arc::new(store),
        invoker: Arc::new(ProcessInvoker::current(role)?),
        transport: Arc::new(DiscordWebhook::new(WebhookConfig::default())?),
        telemetry: None,
    };

    let relay = Relay::new(UnitProfile::for_unit(args.unit), ConfigSource::Env, deps)
        .with_dry_run(args.dry_run);

    let response = relay.handle(&trigger, &execution).await;
    println!("{}", format_output(&response, args.pretty));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_climate_defaults_to_empty_event() {
        let trigger = read_trigger(UnitKind::Climate, None).unwrap();
        assert_eq!(trigger, serde_json::json!({}));
    }

    #[test]
    fn test_read_trigger_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"context": {"deviceType": "WoLock"}}"#).unwrap();

        let trigger = read_trigger(UnitKind::KeyLockBottom, Some(&path)).unwrap();
        assert_eq!(trigger["context"]["deviceType"], "WoLock");
    }

    #[test]
    fn test_read_trigger_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, "not json").unwrap();

        let trigger = read_trigger(UnitKind::KeyLock, Some(&path)).unwrap();
        assert_eq!(trigger, Value::String("not json".to_string()));
    }

    #[test]
    fn test_read_trigger_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_trigger(UnitKind::KeyLock, Some(&dir.path().join("none.json"))).is_err());
    }
}
