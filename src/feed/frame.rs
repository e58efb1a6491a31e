//! Inbound frame parsing (§4.A, §6).
//!
//! The original source branches on whichever keys happen to be present
//! in a deserialized dict. Per spec.md §9's re-architecture note, this
//! is replaced with a tagged sum type and a single parse entry point
//! (`Frame::parse`) that returns a validated variant or `None` — a
//! malformed frame is logged and discarded by the caller, never a panic.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum Frame {
    Tick(TickFrame),
    OhlcBatch(OhlcBatchFrame),
    Heartbeat,
    Status(Value),
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickFrame {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Tickets implied open by this frame, used by the position-close
    /// reconciliation detector when present.
    #[serde(default)]
    pub open_tickets: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OhlcBatchFrame {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub m1: Vec<Value>,
    #[serde(default)]
    pub m5: Vec<Value>,
    #[serde(default)]
    pub m15: Vec<Value>,
}

impl Frame {
    /// Single parse entry point for all four inbound shapes named in §6:
    /// a bare JSON tick object, a `tick <json>`/`OHLC <json>` prefixed
    /// line, or a bare `HEARTBEAT` line. Returns `Unknown` rather than
    /// erroring on anything that parses as JSON but matches no known
    /// shape, and `None` only for input that isn't even well-formed.
    pub fn parse(raw: &str) -> Option<Frame> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with("HEARTBEAT") {
            return Some(Frame::Heartbeat);
        }
        if let Some(rest) = trimmed.strip_prefix("OHLC ") {
            return serde_json::from_str::<OhlcBatchFrame>(rest)
                .ok()
                .map(Frame::OhlcBatch)
                .or(Some(Frame::Unknown));
        }
        let json_body = trimmed.strip_prefix("tick ").unwrap_or(trimmed);
        let value: Value = serde_json::from_str(json_body).ok()?;

        match value.get("type").and_then(Value::as_str) {
            Some("tick") => serde_json::from_value::<TickFrame>(value)
                .ok()
                .map(Frame::Tick)
                .or(Some(Frame::Unknown)),
            Some("heartbeat") => Some(Frame::Heartbeat),
            Some("status") => Some(Frame::Status(value)),
            Some("candle_batch") | Some("OHLC") => serde_json::from_value::<OhlcBatchFrame>(value)
                .ok()
                .map(Frame::OhlcBatch)
                .or(Some(Frame::Unknown)),
            _ => {
                if value.get("bid").is_some() && value.get("ask").is_some() {
                    serde_json::from_value::<TickFrame>(value)
                        .ok()
                        .map(Frame::Tick)
                        .or(Some(Frame::Unknown))
                } else {
                    Some(Frame::Unknown)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_tick_object() {
        let raw = r#"{"type":"tick","symbol":"EURUSD","bid":1.08,"ask":1.0802,"volume":5}"#;
        match Frame::parse(raw) {
            Some(Frame::Tick(t)) => {
                assert_eq!(t.symbol, "EURUSD");
                assert_eq!(t.bid, 1.08);
            }
            other => panic!("expected Tick, got {other:?}"),
        }
    }

    #[test]
    fn parses_heartbeat_line() {
        assert!(matches!(Frame::parse("HEARTBEAT 12345"), Some(Frame::Heartbeat)));
    }

    #[test]
    fn malformed_json_is_discarded_not_panicking() {
        assert!(Frame::parse("tick {not json}").is_none());
    }
}
