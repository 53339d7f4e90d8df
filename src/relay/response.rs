//! 调用响应：`{"statusCode": u16, "body": "<json 字符串>"}`

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// 响应文案
pub mod msg {
    pub const NO_CHANGE: &str = "状態変更なし";
    pub const NOTIFY_DONE_SUFFIX: &str = "状態通知送信完了";
    pub const FORWARDED: &str = "下の鍵処理Lambda関数呼び出し完了";
    pub const IGNORED_DEVICE: &str = "処理対象外のデバイスタイプ";
    pub const CLIMATE_DONE: &str = "温度・湿度通知送信完了";
}

/// 调用响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON 编码后的字符串
    pub body: String,
}

impl InvocationResponse {
    /// `message` + 附加字段
    pub fn message(status_code: u16, message: &str, extra: Map<String, Value>) -> Self {
        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(message.to_string()));
        body.extend(extra);
        Self::with_body(status_code, Value::Object(body))
    }

    /// 错误响应，只含通用信息
    pub fn error(err: &RelayError, extra: Map<String, Value>) -> Self {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(err.public_message().to_string()));
        body.extend(extra);
        Self::with_body(err.status_code(), Value::Object(body))
    }

    fn with_body(status_code: u16, body: Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }

    /// 解析 body（测试和 CLI 输出用）
    pub fn body_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> Value {
        json!({ "statusCode": self.status_code, "body": self.body })
    }
}

/// 构造附加字段
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthRejection;

    #[test]
    fn test_message_response() {
        let response = InvocationResponse::message(
            204,
            msg::NO_CHANGE,
            fields([("current_state", json!("locked"))]),
        );
        assert_eq!(response.status_code, 204);
        let body = response.body_json();
        assert_eq!(body["message"], "状態変更なし");
        assert_eq!(body["current_state"], "locked");
        // 非 ASCII 保持原样
        assert!(response.body.contains("状態変更なし"));
    }

    #[test]
    fn test_error_response_is_generic() {
        let err = RelayError::from(AuthRejection::SourceIp("203.0.113.9".into()));
        let response = InvocationResponse::error(&err, Map::new());
        assert_eq!(response.status_code, 403);
        assert_eq!(response.body_json(), json!({"error": "アクセスが拒否されました"}));
        assert!(!response.body.contains("203.0.113.9"));
    }

    #[test]
    fn test_serialized_field_name() {
        let response = InvocationResponse::message(200, "ok", Map::new());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert!(value["body"].is_string());
        assert_eq!(value, response.to_json());
    }
}
