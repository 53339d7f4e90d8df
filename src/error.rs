//! 错误分类
//!
//! 每次调用只有一个出口：`Relay::handle` 把 `RelayError` 映射为粗粒度响应。
//! 细节（字段名、上游错误码）只写入日志，不进入响应体。

use thiserror::Error;

/// 认证拒绝原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("caller identity rejected: {0}")]
    Identity(String),
    #[error("source ip rejected: {0}")]
    SourceIp(String),
    #[error("request is stale: {0}")]
    Stale(String),
    #[error("signature rejected: {0}")]
    Signature(String),
}

impl AuthRejection {
    /// 拒绝类别（日志用）
    pub fn kind(&self) -> &'static str {
        match self {
            AuthRejection::Identity(_) => "identity",
            AuthRejection::SourceIp(_) => "ip",
            AuthRejection::Stale(_) => "stale",
            AuthRejection::Signature(_) => "signature",
        }
    }
}

/// 事件校验失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error("unknown device type: {0}")]
    UnknownDevice(String),
    #[error("schema violation on field '{field}': {reason}")]
    Schema { field: String, reason: String },
}

impl ValidationError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 配置校验失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// 计算平台（函数配置、调用）返回的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("revision conflict: {0}")]
    Conflict(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// 一次调用的顶层错误
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthRejection),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// 对应的响应状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Authorization(_) => 403,
            RelayError::Validation(_) => 400,
            RelayError::Upstream(_) | RelayError::Internal(_) => 500,
        }
    }

    /// 响应体中的通用错误信息（不含细节）
    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::Authorization(_) => "アクセスが拒否されました",
            RelayError::Validation(_) => "リクエストデータが無効です",
            RelayError::Upstream(_) | RelayError::Internal(_) => "内部サーバーエラー",
        }
    }
}

impl From<ValidationError> for RelayError {
    fn from(e: ValidationError) -> Self {
        RelayError::Validation(e.to_string())
    }
}

impl From<ConfigError> for RelayError {
    fn from(e: ConfigError) -> Self {
        RelayError::Validation(e.to_string())
    }
}

/// 函数配置与调用的失败按请求无效处理（400）
impl From<PlatformError> for RelayError {
    fn from(e: PlatformError) -> Self {
        RelayError::Validation(e.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RelayError::from(AuthRejection::SourceIp("10.0.0.1".into())).status_code(),
            403
        );
        assert_eq!(
            RelayError::from(ValidationError::UnknownDevice("Bot".into())).status_code(),
            400
        );
        assert_eq!(
            RelayError::from(ConfigError::Missing(vec!["URL".into()])).status_code(),
            400
        );
        assert_eq!(
            RelayError::from(PlatformError::NotFound("fn".into())).status_code(),
            400
        );
        assert_eq!(
            RelayError::from(PlatformError::Conflict("rev".into())).status_code(),
            400
        );
        assert_eq!(RelayError::Upstream("webhook".into()).status_code(), 500);
        assert_eq!(RelayError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = RelayError::from(ValidationError::schema("battery", "out of range"));
        assert!(!err.public_message().contains("battery"));
        assert!(err.to_string().contains("battery"));
    }

    #[test]
    fn test_missing_config_lists_keys() {
        let err = ConfigError::Missing(vec!["URL".into(), "USER_ID".into()]);
        assert_eq!(err.to_string(), "missing required settings: URL, USER_ID");
    }
}
