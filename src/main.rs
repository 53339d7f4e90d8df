//! SwitchBot Notify CLI
//!
//! 在本机运行中继单元，以及签名、Webhook 注册等辅助命令

use anyhow::Result;
use clap::{Parser, Subcommand};
use switchbot_notify::cli::{
    handle_invocation, handle_setup_webhook, handle_sign, handle_state, HandleArgs, SetupWebhookArgs, SignArgs,
    StateArgs,
};
use switchbot_notify::logging::{self, DEFAULT_LOG_MAX_LENGTH};

#[derive(Parser)]
#[command(name = "sbn")]
#[command(about = "SwitchBot Notify - 把 SwitchBot 锁和传感器事件转发到 Discord")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行一次单元调用，响应 JSON 输出到 stdout
    Handle(HandleArgs),
    /// 为请求体生成 X-Timestamp / X-Signature
    Sign(SignArgs),
    /// 向 SwitchBot 注册 Webhook 地址
    SetupWebhook(SetupWebhookArgs),
    /// 查看单元的存储状态
    State(StateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，LOG_MAX_LENGTH 控制日志值截断长度
    let max_length = std::env::var("LOG_MAX_LENGTH")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_LOG_MAX_LENGTH);
    logging::init(max_length);

    let cli = Cli::parse();

    match cli.command {
        Commands::Handle(args) => {
            let response = handle_invocation(args).await?;
            if response.status_code >= 500 {
                std::process::exit(1);
            }
        }
        Commands::Sign(args) => handle_sign(args),
        Commands::SetupWebhook(args) => handle_setup_webhook(args).await?,
        Commands::State(args) => handle_state(args).await?,
    }

    Ok(())
}
