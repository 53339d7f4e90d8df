//! 中继主流程
//!
//! 每次调用按固定顺序执行：
//! 1. 加载并校验配置
//! 2. 请求认证
//! 3. 事件校验（Climate 单元改为拉取遥测）
//! 4. 执行上下文预检（探测自身函数，必须带执行角色）
//! 5. 去重检查
//! 6. 转发 / 通知 / 忽略
//! 7. 通知成功后提交状态
//!
//! 任何一步失败都在 `Relay::handle` 里统一映射为响应。

pub mod profile;
pub mod response;

pub use profile::UnitProfile;
pub use response::{msg, InvocationResponse};

use crate::auth::{AuthSettings, RequestAuthenticator};
use crate::config::UnitConfig;
use crate::error::{RelayError, RelayResult, ValidationError};
use crate::event::{validate_readings, DeviceAction, DeviceType, EventValidator, LockStatus, StatusEvent, ValidatedEvent};
use crate::logging::{self, sanitize};
use crate::notification::{NotificationContent, NotificationDispatcher, SendResult, WebhookTransport};
use crate::platform::{ExecutionContext, FunctionInvoker, IdentityService};
use crate::routing::RoutingInvoker;
use crate::state::{DeliveryContext, StateCoordinator, StateStore, KEY_STATE};
use crate::switchbot::{DeviceTelemetry, SwitchBotTelemetry};
use response::fields;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 配置来源
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// 进程环境
    Env,
    /// 固定键值表
    Map(HashMap<String, String>),
}

impl ConfigSource {
    fn load(&self, profile: &UnitProfile) -> RelayResult<UnitConfig> {
        let config = match self {
            ConfigSource::Env => UnitConfig::from_env(profile.kind)?,
            ConfigSource::Map(vars) => UnitConfig::from_map(profile.kind, vars)?,
        };
        Ok(config)
    }
}

/// 外部协作者
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityService>,
    pub state: Arc<dyn StateStore>,
    pub invoker: Arc<dyn FunctionInvoker>,
    pub transport: Arc<dyn WebhookTransport>,
    /// 为 None 时按配置创建 SwitchBot 客户端
    pub telemetry: Option<Arc<dyn DeviceTelemetry>>,
}

/// 一次调用的结果
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Notified {
        device: DeviceType,
        new_state: String,
        battery: Value,
    },
    Deduped {
        current_state: String,
    },
    Forwarded,
    Ignored {
        device: DeviceType,
    },
    ClimateReported {
        timestamp: i64,
    },
}

impl Outcome {
    fn into_response(self) -> InvocationResponse {
        match self {
            Outcome::Notified {
                device,
                new_state,
                battery,
            } => InvocationResponse::message(
                200,
                &format!("{}{}", device.label(), msg::NOTIFY_DONE_SUFFIX),
                fields([("new_state", json!(new_state)), ("battery", battery)]),
            ),
            Outcome::Deduped { current_state } => InvocationResponse::message(
                204,
                msg::NO_CHANGE,
                fields([("current_state", json!(current_state))]),
            ),
            Outcome::Forwarded => InvocationResponse::message(200, msg::FORWARDED, Map::new()),
            Outcome::Ignored { device } => InvocationResponse::message(
                204,
                msg::IGNORED_DEVICE,
                fields([("device_type", json!(device.as_str()))]),
            ),
            Outcome::ClimateReported { timestamp } => InvocationResponse::message(
                200,
                msg::CLIMATE_DONE,
                fields([("timestamp", json!(timestamp))]),
            ),
        }
    }
}

/// 中继
pub struct Relay {
    profile: UnitProfile,
    source: ConfigSource,
    deps: Collaborators,
    dry_run: bool,
    /// 固定的当前时间（Unix 秒）
    fixed_now: Option<i64>,
}

impl Relay {
    pub fn new(profile: UnitProfile, source: ConfigSource, deps: Collaborators) -> Self {
        Self {
            profile,
            source,
            deps,
            dry_run: false,
            fixed_now: None,
        }
    }

    /// dry-run：不发送通知、不提交状态
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 固定当前时间（签名时效检查用）
    pub fn with_now(mut self, now: i64) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    fn now(&self) -> i64 {
        self.fixed_now
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    /// 处理一次调用；所有错误都在这里变成响应
    pub async fn handle(&self, trigger: &Value, execution: &ExecutionContext) -> InvocationResponse {
        let unit = self.profile.kind;
        info!(unit = %unit, dry_run = self.dry_run, "Invocation started");

        match self.run(trigger, execution).await {
            Ok(outcome) => {
                let response = outcome.into_response();
                info!(unit = %unit, status = response.status_code, "Invocation finished");
                response
            }
            Err(e) => {
                match &e {
                    RelayError::Authorization(_) => warn!(unit = %unit, "Access denied"),
                    _ => error!(unit = %unit, error = %sanitize(&e.to_string()), "Invocation failed"),
                }
                let extra = if self.profile.polls_telemetry() {
                    fields([("timestamp", json!(self.now()))])
                } else {
                    Map::new()
                };
                InvocationResponse::error(&e, extra)
            }
        }
    }

    async fn run(&self, trigger: &Value, execution: &ExecutionContext) -> RelayResult<Outcome> {
        let config = self.source.load(&self.profile)?;
        logging::set_max_length(config.log_max_length);

        let authenticator = RequestAuthenticator::new(
            self.profile.policy,
            AuthSettings {
                expected_role: config.expected_role.clone(),
                allowed_source_ips: config.allowed_source_ips.clone(),
                max_request_age: config.max_request_age,
                shared_secret: config.webhook_secret.clone(),
            },
            self.deps.identity.clone(),
        );
        authenticator.authorize(trigger, execution, self.now()).await?;

        if self.profile.polls_telemetry() {
            self.preflight(execution).await?;
            return self.report_climate(&config).await;
        }

        let validator = EventValidator::new(self.profile.shape, self.profile.devices.clone());
        let event = validator.validate(trigger)?;
        self.preflight(execution).await?;

        match &event.event {
            StatusEvent::Ignored { device } => {
                info!(device_type = %device, "Device type is not handled");
                Ok(Outcome::Ignored { device: *device })
            }
            StatusEvent::Lock(lock) => match validator.action_for(lock.device) {
                DeviceAction::Forward => {
                    RoutingInvoker::new(self.deps.invoker.clone())
                        .forward(&config.sibling_function, &event)
                        .await?;
                    Ok(Outcome::Forwarded)
                }
                DeviceAction::Notify => self.notify_lock(&config, &event, lock).await,
                DeviceAction::Ignore => Ok(Outcome::Ignored { device: lock.device }),
            },
            StatusEvent::Climate(_) => Err(RelayError::Internal(
                "climate reading on a lock unit".to_string(),
            )),
        }
    }

    /// 探测自身函数配置，确认执行角色存在
    async fn preflight(&self, execution: &ExecutionContext) -> RelayResult<()> {
        let function = execution.validate()?;
        let configuration = self.deps.invoker.probe(function).await?;
        if configuration.role.is_none() {
            return Err(RelayError::Validation(format!(
                "function {} has no execution role",
                sanitize(&configuration.function_name)
            )));
        }
        info!(function = %sanitize(&configuration.function_name), "Execution context verified");
        Ok(())
    }

    fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(self.deps.transport.clone()).with_dry_run(self.dry_run)
    }

    async fn notify_lock(
        &self,
        config: &UnitConfig,
        event: &ValidatedEvent,
        lock: &LockStatus,
    ) -> RelayResult<Outcome> {
        let coordinator = StateCoordinator::new(self.deps.state.clone(), config.commit_mode);
        let check = coordinator.check(KEY_STATE, &lock.lock_state).await?;

        if self.profile.dedupe && !check.should_notify() {
            info!(state = %sanitize(&lock.lock_state), "State unchanged, skipping notification");
            return Ok(Outcome::Deduped {
                current_state: lock.lock_state.clone(),
            });
        }

        let content = NotificationContent::Lock {
            label: lock.device.label().to_string(),
            lock_state: lock.lock_state.clone(),
            battery: lock.battery,
        };
        let sent = self
            .dispatcher()
            .notify(&config.webhook_url, &config.recipient_id, &content)
            .await?;

        match sent {
            SendResult::Sent => {
                let delivery = DeliveryContext {
                    webhook_url: config.webhook_url.clone(),
                    recipient_id: config.recipient_id.clone(),
                };
                coordinator.commit(&check, &delivery).await?;
            }
            SendResult::Skipped(reason) => {
                info!(reason = %reason, "Notification skipped, state not committed");
            }
        }

        // 响应中回显原始电量值
        let battery = event
            .context
            .get("battery")
            .cloned()
            .unwrap_or_else(|| json!(lock.battery));

        Ok(Outcome::Notified {
            device: lock.device,
            new_state: lock.lock_state.clone(),
            battery,
        })
    }

    async fn report_climate(&self, config: &UnitConfig) -> RelayResult<Outcome> {
        let telemetry: Arc<dyn DeviceTelemetry> = match &self.deps.telemetry {
            Some(telemetry) => telemetry.clone(),
            None => {
                let settings = config.telemetry.as_ref().ok_or_else(|| {
                    RelayError::Internal("telemetry settings missing".to_string())
                })?;
                Arc::new(SwitchBotTelemetry::new(settings)?)
            }
        };

        let body = telemetry.device_status().await?;
        // 读数来自上游 API，不是调用方输入
        let reading = validate_readings(&body).map_err(|e: ValidationError| {
            RelayError::Upstream(format!("telemetry readings rejected: {}", e))
        })?;

        self.dispatcher()
            .notify(
                &config.webhook_url,
                &config.recipient_id,
                &NotificationContent::Climate(reading),
            )
            .await?;

        Ok(Outcome::ClimateReported {
            timestamp: self.now(),
        })
    }
}
