//! Schema validation for events on the bus (§ "Event Bus" component H).
//! Grounded on original source `event_bus/event_schema.py`'s
//! `EventSchemaValidator` (`FieldRule`/`FieldType`, per-event-type field
//! tables, base-event fields checked first).

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use super::{Event, EventType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    pub field_type: FieldType,
    pub required: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub max_length: Option<usize>,
    pub allowed_values: Option<&'static [&'static str]>,
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::String
    }
}

impl FieldRule {
    const fn required(field_type: FieldType) -> Self {
        FieldRule { field_type, required: true, min_value: None, max_value: None, max_length: None, allowed_values: None }
    }

    const fn optional(field_type: FieldType) -> Self {
        FieldRule { field_type, required: false, min_value: None, max_value: None, max_length: None, allowed_values: None }
    }

    const fn min(mut self, min_value: f64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    const fn max_len(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    const fn allowed(mut self, values: &'static [&'static str]) -> Self {
        self.allowed_values = Some(values);
        self
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("required field '{0}' is missing")]
    MissingField(String),
    #[error("field '{field}' must be a {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("field '{field}' value {value} is out of range")]
    OutOfRange { field: String, value: f64 },
    #[error("field '{field}' exceeds max length {max}")]
    TooLong { field: String, max: usize },
    #[error("field '{field}' value '{value}' is not one of the allowed values")]
    NotAllowed { field: String, value: String },
}

fn base_event_schema() -> HashMap<&'static str, FieldRule> {
    HashMap::from([
        ("source", FieldRule::required(FieldType::String).max_len(100)),
        ("correlation_id", FieldRule::optional(FieldType::String).max_len(200)),
        ("user_id", FieldRule::optional(FieldType::String).max_len(50)),
        ("session_id", FieldRule::optional(FieldType::String).max_len(100)),
    ])
}

fn data_schema_for(event_type: EventType) -> HashMap<&'static str, FieldRule> {
    match event_type {
        EventType::SignalGenerated => HashMap::from([
            ("signal_id", FieldRule::required(FieldType::String).max_len(200)),
            ("symbol", FieldRule::required(FieldType::String).max_len(10)),
            ("direction", FieldRule::required(FieldType::String).allowed(&["BUY", "SELL"])),
            ("confidence", FieldRule::required(FieldType::Float).min(0.0)),
            ("pattern_type", FieldRule::required(FieldType::String).max_len(100)),
        ]),
        EventType::FireCommand => HashMap::from([
            ("fire_id", FieldRule::required(FieldType::String).max_len(200)),
            ("ticket", FieldRule::required(FieldType::Integer).min(1.0)),
            ("symbol", FieldRule::required(FieldType::String).max_len(10)),
            ("direction", FieldRule::required(FieldType::String).allowed(&["BUY", "SELL"])),
        ]),
        EventType::TradeExecuted | EventType::TradeConfirmed => HashMap::from([
            ("ticket", FieldRule::required(FieldType::Integer).min(1.0)),
            ("symbol", FieldRule::required(FieldType::String).max_len(10)),
        ]),
        EventType::SystemHealth => HashMap::from([
            ("component", FieldRule::required(FieldType::String).max_len(100)),
            ("status", FieldRule::required(FieldType::String)),
        ]),
        EventType::MarketData => HashMap::from([
            ("symbol", FieldRule::required(FieldType::String).max_len(10)),
            ("bid", FieldRule::required(FieldType::Float).min(0.0)),
            ("ask", FieldRule::required(FieldType::Float).min(0.0)),
        ]),
        EventType::UserAction => HashMap::from([
            ("user_id", FieldRule::required(FieldType::String).max_len(50)),
            ("action", FieldRule::required(FieldType::String).max_len(100)),
        ]),
        EventType::SignalExpired | EventType::BalanceUpdate | EventType::PatternDetected => HashMap::new(),
    }
}

/// Validates the base envelope fields plus the event-type-specific
/// `data` payload. Built once and reused by [`super::EventBus`].
pub struct EventSchemaValidator {
    base: HashMap<&'static str, FieldRule>,
}

impl EventSchemaValidator {
    pub fn new() -> Self {
        EventSchemaValidator { base: base_event_schema() }
    }

    pub fn validate(&self, event: &Event) -> Result<(), ValidationError> {
        if event.source.len() > 100 {
            return Err(ValidationError::TooLong { field: "source".into(), max: 100 });
        }
        for (name, rule) in &self.base {
            let value = match *name {
                "source" => Some(Value::String(event.source.clone())),
                "correlation_id" => event.correlation_id.clone().map(Value::String),
                "user_id" => event.user_id.clone().map(Value::String),
                "session_id" => event.session_id.clone().map(Value::String),
                _ => None,
            };
            check_field(name, value.as_ref(), rule)?;
        }

        let Value::Object(data) = &event.data else {
            return Err(ValidationError::WrongType { field: "data".into(), expected: "object" });
        };
        let schema = data_schema_for(event.event_type);
        for (name, rule) in &schema {
            check_field(name, data.get(*name), rule)?;
        }
        Ok(())
    }
}

impl Default for EventSchemaValidator {
    fn default() -> Self {
        EventSchemaValidator::new()
    }
}

fn check_field(name: &str, value: Option<&Value>, rule: &FieldRule) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return if rule.required { Err(ValidationError::MissingField(name.to_string())) } else { Ok(()) };
    };
    if value.is_null() {
        return if rule.required { Err(ValidationError::MissingField(name.to_string())) } else { Ok(()) };
    }

    match rule.field_type {
        FieldType::String => {
            let Some(s) = value.as_str() else {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "string" });
            };
            if let Some(max) = rule.max_length {
                if s.len() > max {
                    return Err(ValidationError::TooLong { field: name.to_string(), max });
                }
            }
            if let Some(allowed) = rule.allowed_values {
                if !allowed.contains(&s) {
                    return Err(ValidationError::NotAllowed { field: name.to_string(), value: s.to_string() });
                }
            }
        }
        FieldType::Integer => {
            let Some(n) = value.as_i64() else {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "integer" });
            };
            if let Some(min) = rule.min_value {
                if (n as f64) < min {
                    return Err(ValidationError::OutOfRange { field: name.to_string(), value: n as f64 });
                }
            }
        }
        FieldType::Float => {
            let Some(n) = value.as_f64() else {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "number" });
            };
            if let Some(min) = rule.min_value {
                if n < min {
                    return Err(ValidationError::OutOfRange { field: name.to_string(), value: n });
                }
            }
            if let Some(max) = rule.max_value {
                if n > max {
                    return Err(ValidationError::OutOfRange { field: name.to_string(), value: n });
                }
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "boolean" });
            }
        }
        FieldType::Object => {
            if !value.is_object() {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "object" });
            }
        }
        FieldType::Array => {
            if !value.is_array() {
                return Err(ValidationError::WrongType { field: name.to_string(), expected: "array" });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventbus::Event;
    use chrono::Utc;

    fn signal_event(data: Value) -> Event {
        Event::new(EventType::SignalGenerated, "publisher", data, Utc::now())
    }

    #[test]
    fn accepts_well_formed_signal_generated() {
        let validator = EventSchemaValidator::new();
        let data = serde_json::json!({
            "signal_id": "ELITE_GUARD_EURUSD_1",
            "symbol": "EURUSD",
            "direction": "BUY",
            "confidence": 82.0,
            "pattern_type": "liquidity_sweep_reversal",
        });
        assert!(validator.validate(&signal_event(data)).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let validator = EventSchemaValidator::new();
        let data = serde_json::json!({ "symbol": "EURUSD" });
        assert!(validator.validate(&signal_event(data)).is_err());
    }

    #[test]
    fn rejects_disallowed_direction_value() {
        let validator = EventSchemaValidator::new();
        let data = serde_json::json!({
            "signal_id": "id",
            "symbol": "EURUSD",
            "direction": "SIDEWAYS",
            "confidence": 50.0,
            "pattern_type": "x",
        });
        assert!(matches!(validator.validate(&signal_event(data)), Err(ValidationError::NotAllowed { .. })));
    }

    #[test]
    fn rejects_negative_confidence() {
        let validator = EventSchemaValidator::new();
        let data = serde_json::json!({
            "signal_id": "id",
            "symbol": "EURUSD",
            "direction": "BUY",
            "confidence": -5.0,
            "pattern_type": "x",
        });
        assert!(matches!(validator.validate(&signal_event(data)), Err(ValidationError::OutOfRange { .. })));
    }
}
