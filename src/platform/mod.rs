//! 计算平台抽象 - 执行上下文、身份服务、函数调用
//!
//! 真实平台（IAM/STS、Lambda API）位于进程外，这里只定义接缝。
//! `local` 提供基于本机进程与环境变量的实现，供 `sbn` CLI 使用。

pub mod local;

pub use local::{EnvIdentity, ProcessInvoker, StaticIdentity};

use crate::error::PlatformError;
use async_trait::async_trait;
use serde_json::Value;

/// 调用目标标识必须满足的前缀
pub const INVOCATION_TARGET_PREFIX: &str = "arn:aws:lambda:";

/// 执行上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub invoked_function_arn: String,
}

impl ExecutionContext {
    pub fn new(invoked_function_arn: impl Into<String>) -> Self {
        Self {
            invoked_function_arn: invoked_function_arn.into(),
        }
    }

    /// 以单元函数名构造本地 ARN
    pub fn local(function_name: &str) -> Self {
        Self::new(format!(
            "{}local:000000000000:function:{}",
            INVOCATION_TARGET_PREFIX, function_name
        ))
    }

    pub fn validate(&self) -> Result<&str, PlatformError> {
        if self.invoked_function_arn.starts_with(INVOCATION_TARGET_PREFIX) {
            Ok(&self.invoked_function_arn)
        } else {
            Err(PlatformError::InvalidParameter(
                "invocation target is not a function arn".to_string(),
            ))
        }
    }
}

/// 身份服务：查询当前执行身份
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn caller_principal(&self) -> Result<String, PlatformError>;
}

/// 函数配置（探测结果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfiguration {
    pub function_name: String,
    /// 执行角色
    pub role: Option<String>,
}

/// 函数调用器
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// 确认函数存在并返回其配置
    async fn probe(&self, function: &str) -> Result<FunctionConfiguration, PlatformError>;

    /// 异步调用（只等待平台受理，不等待执行结果）
    async fn invoke_event(&self, function: &str, payload: &Value) -> Result<(), PlatformError>;
}
