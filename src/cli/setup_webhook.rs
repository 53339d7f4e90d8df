//! setup-webhook 命令 - 向 SwitchBot 注册推送地址

use crate::switchbot::{SwitchBotClient, SETUP_WEBHOOK_URL};
use anyhow::Result;
use clap::Args;

/// setup-webhook 命令参数
#[derive(Args)]
pub struct SetupWebhookArgs {
    /// Relay URL that SwitchBot should push device events to
    #[arg(long)]
    pub url: String,

    /// SwitchBot open token
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// SwitchBot client secret
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Registration endpoint
    #[arg(long, default_value = SETUP_WEBHOOK_URL)]
    pub endpoint: String,
}

/// 处理 setup-webhook 命令
pub async fn handle_setup_webhook(args: SetupWebhookArgs) -> Result<()> {
    let client = SwitchBotClient::new(args.token, args.secret)?;
    let response = client.setup_webhook(&args.endpoint, &args.url).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
