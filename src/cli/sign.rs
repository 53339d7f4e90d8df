//! sign 命令 - 为请求体生成签名头（调用方一侧）

use crate::auth::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use clap::Args;
use serde::Serialize;

/// sign 命令参数
#[derive(Args)]
pub struct SignArgs {
    /// Shared webhook secret
    #[arg(long, env = "WEBHOOK_SECRET")]
    pub secret: String,

    /// Unix timestamp in seconds (defaults to now)
    #[arg(long)]
    pub timestamp: Option<i64>,

    /// Raw request body to sign
    #[arg(long)]
    pub body: String,
}

/// 签名头
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SignedHeaders {
    #[serde(rename = "X-Timestamp")]
    pub timestamp: String,
    #[serde(rename = "X-Signature")]
    pub signature: String,
}

/// 生成签名头
pub fn sign_request(args: &SignArgs) -> SignedHeaders {
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
        .to_string();
    let signature = signature::sign(&args.secret, &timestamp, &args.body);
    SignedHeaders {
        timestamp,
        signature,
    }
}

/// 处理 sign 命令
pub fn handle_sign(args: SignArgs) {
    let headers = sign_request(&args);
    println!("{}: {}", TIMESTAMP_HEADER, headers.timestamp);
    println!("{}: {}", SIGNATURE_HEADER, headers.signature);
}
