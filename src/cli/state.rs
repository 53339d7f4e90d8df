//! state 命令 - 查看单元的存储记录

use super::output::format_output;
use crate::config::UnitKind;
use crate::state::{FileStateStore, StateStore, StoredRecord};
use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;

/// state 命令参数
#[derive(Args)]
pub struct StateArgs {
    /// Unit whose record to show
    #[arg(long, value_enum)]
    pub unit: UnitKind,

    /// Override the state file location
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

/// 记录的展示形式
pub fn render_record(unit: UnitKind, path: &str, record: &StoredRecord) -> Value {
    json!({
        "unit": unit.as_str(),
        "path": path,
        "revision": record.revision,
        "variables": record.vars,
    })
}

/// 处理 state 命令
pub async fn handle_state(args: StateArgs) -> Result<()> {
    let store = match &args.state_file {
        Some(path) => FileStateStore::new(path),
        None => FileStateStore::for_unit(args.unit),
    };
    let record = store.load().await?;
    let rendered = render_record(args.unit, &store.path().display().to_string(), &record);
    println!("{}", format_output(&rendered, true));
    Ok(())
}
