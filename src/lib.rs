//! SwitchBot Notify - 把 SwitchBot 锁和温湿度事件转发到 Discord Webhook

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod notification;
pub mod platform;
pub mod relay;
pub mod routing;
pub mod state;
pub mod switchbot;

pub use auth::{AuthPolicy, AuthSettings, RequestAuthenticator};
pub use config::{UnitConfig, UnitKind};
pub use error::{AuthRejection, ConfigError, PlatformError, RelayError, RelayResult, ValidationError};
pub use event::{DeviceType, EventValidator, StatusEvent, ValidatedEvent};
pub use notification::{DiscordWebhook, NotificationDispatcher, SendResult, WebhookTransport};
pub use platform::{ExecutionContext, FunctionInvoker, IdentityService};
pub use relay::{Collaborators, ConfigSource, InvocationResponse, Relay, UnitProfile};
pub use routing::RoutingInvoker;
pub use state::{CommitMode, FileStateStore, MemoryStateStore, StateCoordinator, StateStore};
pub use switchbot::{DeviceTelemetry, SwitchBotClient};
