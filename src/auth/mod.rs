//! 请求认证 - 调用者身份、来源 IP、请求签名
//!
//! 检查按顺序执行，遇到第一个失败即返回：
//! 1. 执行身份（ARN 前缀 + 身份服务返回的 principal 含预期角色名）
//! 2. 来源 IP 白名单（白名单为空时跳过）
//! 3. 签名 + 时间戳（仅在配置了共享密钥时）
//!
//! 定时触发（无外部调用者）只做第 1 项。

pub mod signature;

use crate::error::AuthRejection;
use crate::logging::{sanitize, sanitize_opt};
use crate::platform::{ExecutionContext, IdentityService};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 身份服务查询超时
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

/// 认证策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// 外部请求：身份 + IP + 签名
    InteractiveSigned,
    /// 定时/内部调用：仅身份
    Scheduled,
}

/// 认证参数
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub expected_role: String,
    pub allowed_source_ips: Vec<String>,
    pub max_request_age: i64,
    pub shared_secret: Option<String>,
}

/// 从触发事件中提取的认证材料（只在一次调用内存活）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    /// `requestContext.identity.sourceIp`
    pub context_source_ip: Option<String>,
    /// `X-Forwarded-For` 的第一项
    pub forwarded_for: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub body: String,
}

impl AuthContext {
    pub fn from_trigger(trigger: &Value) -> Self {
        let context_source_ip = trigger
            .pointer("/requestContext/identity/sourceIp")
            .and_then(Value::as_str)
            .filter(|ip| !ip.trim().is_empty())
            .map(|ip| ip.trim().to_string());

        let forwarded_for = header(trigger, "X-Forwarded-For")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty());

        Self {
            context_source_ip,
            forwarded_for,
            signature: header(trigger, signature::SIGNATURE_HEADER),
            timestamp: header(trigger, signature::TIMESTAMP_HEADER),
            body: trigger
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// 请求上下文字段优先于 X-Forwarded-For
    pub fn source_ip(&self) -> Option<&str> {
        self.context_source_ip
            .as_deref()
            .or(self.forwarded_for.as_deref())
    }
}

/// 大小写不敏感的 header 读取
fn header(trigger: &Value, name: &str) -> Option<String> {
    trigger
        .get("headers")
        .and_then(Value::as_object)?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_str())
        .map(str::to_string)
}

/// 来源 IP 校验；白名单为空时放行
pub fn verify_source_ip(ctx: &AuthContext, allowlist: &[String]) -> Result<(), AuthRejection> {
    if allowlist.is_empty() {
        info!(source_ip = %sanitize_opt(ctx.source_ip()), "Source ip allowlist empty, skipping");
        return Ok(());
    }

    let ip = ctx
        .source_ip()
        .ok_or_else(|| AuthRejection::SourceIp("source ip unavailable".to_string()))?;

    if !allowlist.iter().any(|allowed| allowed == ip) {
        return Err(AuthRejection::SourceIp(format!("{} not allowed", sanitize(ip))));
    }

    info!(source_ip = %sanitize(ip), "Source ip verified");
    Ok(())
}

/// 签名与时间戳校验
pub fn verify_request_signature(
    ctx: &AuthContext,
    secret: &str,
    max_age: i64,
    now: i64,
) -> Result<(), AuthRejection> {
    let (sig, ts) = match (ctx.signature.as_deref(), ctx.timestamp.as_deref()) {
        (Some(sig), Some(ts)) if !sig.is_empty() && !ts.is_empty() => (sig, ts),
        _ => {
            return Err(AuthRejection::Signature(
                "signature or timestamp header missing".to_string(),
            ))
        }
    };

    let request_time: i64 = ts
        .trim()
        .parse()
        .map_err(|_| AuthRejection::Stale(format!("unparseable timestamp {}", sanitize(ts))))?;

    let age = now.saturating_sub(request_time);
    if age.unsigned_abs() > max_age.unsigned_abs() {
        return Err(AuthRejection::Stale(format!("request age {}s", age)));
    }

    if !signature::verify(sig, ts, &ctx.body, secret) {
        return Err(AuthRejection::Signature("signature mismatch".to_string()));
    }

    info!("Request signature verified");
    Ok(())
}

/// 请求认证器
pub struct RequestAuthenticator {
    policy: AuthPolicy,
    settings: AuthSettings,
    identity: Arc<dyn IdentityService>,
}

impl RequestAuthenticator {
    pub fn new(policy: AuthPolicy, settings: AuthSettings, identity: Arc<dyn IdentityService>) -> Self {
        Self {
            policy,
            settings,
            identity,
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    /// 执行全部检查
    pub async fn authorize(
        &self,
        trigger: &Value,
        execution: &ExecutionContext,
        now: i64,
    ) -> Result<(), AuthRejection> {
        info!(policy = ?self.policy, "Authorization checks started");

        let result = self.run_checks(trigger, execution, now).await;
        match &result {
            Ok(()) => info!("All authorization checks passed"),
            Err(rejection) => error!(
                kind = rejection.kind(),
                detail = %sanitize(&rejection.to_string()),
                "Authorization rejected"
            ),
        }
        result
    }

    async fn run_checks(
        &self,
        trigger: &Value,
        execution: &ExecutionContext,
        now: i64,
    ) -> Result<(), AuthRejection> {
        self.verify_caller_identity(execution).await?;

        if self.policy == AuthPolicy::Scheduled {
            return Ok(());
        }

        let ctx = AuthContext::from_trigger(trigger);
        verify_source_ip(&ctx, &self.settings.allowed_source_ips)?;

        if let Some(secret) = self.settings.shared_secret.as_deref() {
            verify_request_signature(&ctx, secret, self.settings.max_request_age, now)?;
        }

        Ok(())
    }

    async fn verify_caller_identity(&self, execution: &ExecutionContext) -> Result<(), AuthRejection> {
        execution
            .validate()
            .map_err(|e| AuthRejection::Identity(e.to_string()))?;

        let principal = match tokio::time::timeout(IDENTITY_TIMEOUT, self.identity.caller_principal()).await {
            Ok(Ok(principal)) => principal,
            Ok(Err(e)) => return Err(AuthRejection::Identity(format!("identity lookup failed: {}", e))),
            Err(_) => return Err(AuthRejection::Identity("identity lookup timed out".to_string())),
        };

        if !principal.contains(&self.settings.expected_role) {
            return Err(AuthRejection::Identity(format!(
                "unexpected principal {}",
                sanitize(&principal)
            )));
        }

        info!(principal = %sanitize(&principal), "Caller identity verified");
        Ok(())
    }
}
