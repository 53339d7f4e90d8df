//! 事件校验器

use super::{ClimateReading, DeviceAction, DeviceTable, DeviceType, LockStatus, StatusEvent, ValidatedEvent};
use crate::error::ValidationError;
use crate::logging::sanitize;
use serde_json::{Map, Value};
use tracing::info;

/// 触发事件的外形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerShape {
    /// HTTP 风格：`headers` / `requestContext` / `body`（JSON 字符串）
    Request,
    /// 直接调用：顶层内联 `context`
    Direct,
    /// 定时触发，无事件载荷
    Scheduled,
}

/// 事件校验器
#[derive(Debug, Clone)]
pub struct EventValidator {
    shape: TriggerShape,
    devices: DeviceTable,
}

impl EventValidator {
    pub fn new(shape: TriggerShape, devices: DeviceTable) -> Self {
        Self { shape, devices }
    }

    /// 校验原始事件，产出类型化事件
    pub fn validate(&self, raw: &Value) -> Result<ValidatedEvent, ValidationError> {
        let event = raw
            .as_object()
            .ok_or_else(|| ValidationError::Malformed("event is not an object".to_string()))?;

        let context = self.extract_context(event)?;

        let device = match context.get("deviceType") {
            Some(Value::String(raw_type)) => DeviceType::parse(raw_type)
                .filter(|d| self.devices.action_for(*d).is_some())
                .ok_or_else(|| ValidationError::UnknownDevice(sanitize(raw_type)))?,
            Some(other) => return Err(ValidationError::UnknownDevice(sanitize(&other.to_string()))),
            None => self.devices.implied().ok_or_else(|| {
                ValidationError::schema("deviceType", "missing")
            })?,
        };

        let action = self
            .devices
            .action_for(device)
            .ok_or_else(|| ValidationError::UnknownDevice(device.to_string()))?;

        let status = if action.is_actionable() {
            StatusEvent::Lock(Self::validate_lock(device, &context)?)
        } else {
            info!(device_type = %device, "Device type acknowledged without action");
            StatusEvent::Ignored { device }
        };

        Ok(ValidatedEvent {
            event: status,
            context,
        })
    }

    /// 处理方式（校验之后查询）
    pub fn action_for(&self, device: DeviceType) -> DeviceAction {
        self.devices.action_for(device).unwrap_or(DeviceAction::Ignore)
    }

    fn extract_context(&self, event: &Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        let envelope = match self.shape {
            TriggerShape::Request => {
                let body = event
                    .get("body")
                    .ok_or_else(|| ValidationError::Malformed("missing 'body'".to_string()))?;
                let body = body
                    .as_str()
                    .ok_or_else(|| ValidationError::Malformed("'body' is not a string".to_string()))?;
                let decoded: Value = serde_json::from_str(body)
                    .map_err(|e| ValidationError::Malformed(format!("body is not valid json: {}", e)))?;
                match decoded {
                    Value::Object(map) => map,
                    _ => return Err(ValidationError::Malformed("body is not an object".to_string())),
                }
            }
            TriggerShape::Direct | TriggerShape::Scheduled => event.clone(),
        };

        match envelope.get("context") {
            Some(Value::Object(context)) => Ok(context.clone()),
            Some(_) => Err(ValidationError::Malformed("'context' is not an object".to_string())),
            None => Err(ValidationError::Malformed("missing 'context'".to_string())),
        }
    }

    fn validate_lock(device: DeviceType, context: &Map<String, Value>) -> Result<LockStatus, ValidationError> {
        for field in ["battery", "lockState"] {
            if !context.contains_key(field) {
                return Err(ValidationError::schema(field, "missing"));
            }
        }

        let battery = context
            .get("battery")
            .and_then(Value::as_f64)
            .filter(|b| (0.0..=100.0).contains(b))
            .ok_or_else(|| ValidationError::schema("battery", "must be a number in 0..=100"))?;

        let lock_state = context
            .get("lockState")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::schema("lockState", "must be a non-empty string"))?;

        Ok(LockStatus {
            device,
            battery,
            lock_state: lock_state.to_string(),
        })
    }
}

/// 校验温湿度读数（数字或可解析为数字的字符串）
pub fn validate_readings(body: &Value) -> Result<ClimateReading, ValidationError> {
    let body = body
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("device body is not an object".to_string()))?;

    let temperature = coerce_number(body, "temperature")?;
    let humidity = coerce_number(body, "humidity")?;

    Ok(ClimateReading {
        temperature,
        humidity,
    })
}

fn coerce_number(body: &Map<String, Value>, field: &str) -> Result<f64, ValidationError> {
    let value = match body.get(field) {
        None | Some(Value::Null) => return Err(ValidationError::schema(field, "missing")),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::schema(field, "not numeric"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key_lock_validator() -> EventValidator {
        EventValidator::new(
            TriggerShape::Request,
            DeviceTable::new(vec![
                (DeviceType::WoLockPro, DeviceAction::Notify),
                (DeviceType::WoLock, DeviceAction::Forward),
                (DeviceType::WoHub2, DeviceAction::Ignore),
            ]),
        )
    }

    fn request(context: Value) -> Value {
        json!({
            "headers": {},
            "body": json!({"eventType": "changeReport", "context": context}).to_string(),
        })
    }

    #[test]
    fn test_valid_lock_event() {
        let validated = key_lock_validator()
            .validate(&request(json!({
                "deviceType": "WoLockPro",
                "battery": 55,
                "lockState": "locked",
                "deviceMac": "AA:BB"
            })))
            .unwrap();
        assert_eq!(
            validated.event,
            StatusEvent::Lock(LockStatus {
                device: DeviceType::WoLockPro,
                battery: 55.0,
                lock_state: "locked".to_string(),
            })
        );
        assert_eq!(validated.context["deviceMac"], "AA:BB");
    }

    #[test]
    fn test_malformed_envelopes() {
        let v = key_lock_validator();
        assert!(matches!(v.validate(&json!("str")), Err(ValidationError::Malformed(_))));
        assert!(matches!(v.validate(&json!({})), Err(ValidationError::Malformed(_))));
        assert!(matches!(
            v.validate(&json!({"body": "{not json"})),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            v.validate(&json!({"body": "[1,2]"})),
            Err(ValidationError::Malformed(_))
        ));
        assert!(matches!(
            v.validate(&json!({"body": "{\"context\": 3}"})),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_device_type() {
        let v = key_lock_validator();
        let err = v
            .validate(&request(json!({"deviceType": "WoCurtain"})))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownDevice("WoCurtain".to_string()));

        let err = v.validate(&request(json!({"deviceType": 7}))).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownDevice(_)));

        let err = v.validate(&request(json!({"battery": 5}))).unwrap_err();
        assert_eq!(err, ValidationError::schema("deviceType", "missing"));
    }

    #[test]
    fn test_battery_bounds() {
        let v = key_lock_validator();
        for battery in [json!(-1), json!(100.5), json!("55"), json!(null), json!(true)] {
            let err = v
                .validate(&request(json!({
                    "deviceType": "WoLockPro",
                    "battery": battery,
                    "lockState": "locked"
                })))
                .unwrap_err();
            assert!(
                matches!(err, ValidationError::Schema { ref field, .. } if field == "battery"),
                "battery {} should be rejected",
                battery
            );
        }
        for battery in [json!(0), json!(100), json!(42.5)] {
            assert!(v
                .validate(&request(json!({
                    "deviceType": "WoLockPro",
                    "battery": battery,
                    "lockState": "locked"
                })))
                .is_ok());
        }
    }

    #[test]
    fn test_lock_state_required() {
        let v = key_lock_validator();
        for lock_state in [json!(""), json!("   "), json!(1)] {
            let err = v
                .validate(&request(json!({
                    "deviceType": "WoLock",
                    "battery": 50,
                    "lockState": lock_state
                })))
                .unwrap_err();
            assert!(matches!(err, ValidationError::Schema { ref field, .. } if field == "lockState"));
        }

        let err = v
            .validate(&request(json!({"deviceType": "WoLock", "battery": 50})))
            .unwrap_err();
        assert_eq!(err, ValidationError::schema("lockState", "missing"));
    }

    #[test]
    fn test_non_actionable_device_skips_schema() {
        let validated = key_lock_validator()
            .validate(&request(json!({"deviceType": "WoHub2"})))
            .unwrap();
        assert_eq!(
            validated.event,
            StatusEvent::Ignored {
                device: DeviceType::WoHub2
            }
        );
    }

    #[test]
    fn test_direct_shape_with_implied_device() {
        let v = EventValidator::new(
            TriggerShape::Direct,
            DeviceTable::new(vec![(DeviceType::WoLock, DeviceAction::Notify)])
                .with_implied(DeviceType::WoLock),
        );
        let validated = v
            .validate(&json!({"context": {"battery": 80, "lockState": "unlocked"}}))
            .unwrap();
        assert_eq!(validated.event.device(), Some(DeviceType::WoLock));

        // 直接调用时 body 字符串不被解析
        assert!(v
            .validate(&json!({"body": "{\"context\": {}}"}))
            .is_err());

        // 该单元不接受 WoLockPro
        let err = v
            .validate(&json!({"context": {"deviceType": "WoLockPro", "battery": 1, "lockState": "x"}}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownDevice(_)));
    }

    #[test]
    fn test_readings_coercion() {
        let reading = validate_readings(&json!({"temperature": "21.5", "humidity": 40})).unwrap();
        assert_eq!(reading.temperature, 21.5);
        assert_eq!(reading.humidity, 40.0);

        let err = validate_readings(&json!({"temperature": 21.5})).unwrap_err();
        assert_eq!(err, ValidationError::schema("humidity", "missing"));

        let err = validate_readings(&json!({"temperature": "warm", "humidity": 40})).unwrap_err();
        assert_eq!(err, ValidationError::schema("temperature", "not numeric"));

        assert!(validate_readings(&json!([1, 2])).is_err());
    }
}
