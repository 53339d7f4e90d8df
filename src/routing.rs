//! 跨单元转发：先探测目标函数，再以事件方式异步调用

use crate::error::{PlatformError, RelayError};
use crate::event::ValidatedEvent;
use crate::logging::sanitize;
use crate::platform::FunctionInvoker;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// 转发失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// 目标函数不存在
    #[error("routing target not found: {0}")]
    NotFound(String),
    #[error("routing failed: {0}")]
    Failed(String),
}

impl From<RoutingError> for RelayError {
    fn from(e: RoutingError) -> Self {
        RelayError::Validation(e.to_string())
    }
}

/// 转发器
pub struct RoutingInvoker {
    invoker: Arc<dyn FunctionInvoker>,
}

impl RoutingInvoker {
    pub fn new(invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self { invoker }
    }

    /// 把已校验的 context 转发给目标单元（只传 `{"context": ...}`）
    pub async fn forward(&self, target: &str, event: &ValidatedEvent) -> Result<(), RoutingError> {
        let target_name = sanitize(target);

        match self.invoker.probe(target).await {
            Ok(config) => info!(target = %target_name, function = %sanitize(&config.function_name), "Routing target found"),
            Err(PlatformError::NotFound(detail)) => {
                error!(target = %target_name, "Routing target not found");
                return Err(RoutingError::NotFound(detail));
            }
            Err(e) => {
                error!(target = %target_name, error = %sanitize(&e.to_string()), "Routing target probe failed");
                return Err(RoutingError::Failed(e.to_string()));
            }
        }

        self.invoker
            .invoke_event(target, &event.forward_payload())
            .await
            .map_err(|e| {
                error!(target = %target_name, error = %sanitize(&e.to_string()), "Routing invocation failed");
                RoutingError::Failed(e.to_string())
            })?;

        info!(target = %target_name, "Event forwarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceType, StatusEvent};
    use crate::platform::FunctionConfiguration;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingInvoker {
        probe_error: Option<PlatformError>,
        invocations: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl FunctionInvoker for RecordingInvoker {
        async fn probe(&self, function: &str) -> Result<FunctionConfiguration, PlatformError> {
            match &self.probe_error {
                Some(e) => Err(e.clone()),
                None => Ok(FunctionConfiguration {
                    function_name: function.to_string(),
                    role: None,
                }),
            }
        }

        async fn invoke_event(&self, function: &str, payload: &Value) -> Result<(), PlatformError> {
            self.invocations
                .lock()
                .unwrap()
                .push((function.to_string(), payload.clone()));
            Ok(())
        }
    }

    fn wolock_event() -> ValidatedEvent {
        let context: Map<String, Value> = json!({
            "deviceType": "WoLock",
            "battery": 80,
            "lockState": "unlocked"
        })
        .as_object()
        .unwrap()
        .clone();
        ValidatedEvent {
            event: StatusEvent::Ignored {
                device: DeviceType::WoLock,
            },
            context,
        }
    }

    #[tokio::test]
    async fn test_forward_sends_context_only() {
        let invoker = Arc::new(RecordingInvoker::default());
        let router = RoutingInvoker::new(invoker.clone());

        router.forward("sendKeyLockStatusBottom", &wolock_event()).await.unwrap();

        let calls = invoker.invocations.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendKeyLockStatusBottom");
        assert_eq!(calls[0].1["context"]["lockState"], "unlocked");
        assert_eq!(calls[0].1.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_target_is_not_found() {
        let invoker = Arc::new(RecordingInvoker {
            probe_error: Some(PlatformError::NotFound("x".into())),
            ..Default::default()
        });
        let router = RoutingInvoker::new(invoker.clone());

        let err = router.forward("x", &wolock_event()).await.unwrap_err();
        assert_eq!(err, RoutingError::NotFound("x".into()));
        assert!(invoker.invocations.lock().unwrap().is_empty());
        assert_eq!(RelayError::from(err).status_code(), 400);
    }

    #[tokio::test]
    async fn test_access_denied_is_failed() {
        let invoker = Arc::new(RecordingInvoker {
            probe_error: Some(PlatformError::AccessDenied("nope".into())),
            ..Default::default()
        });
        let router = RoutingInvoker::new(invoker);

        let err = router.forward("x", &wolock_event()).await.unwrap_err();
        assert!(matches!(err, RoutingError::Failed(_)));
    }
}
