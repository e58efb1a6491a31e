//! Event Bus (component H, optional, §2): a durable pub-sub broker plus
//! an SQLite collector with schema validation, sitting beside the main
//! `A→B→C→D→E→F` signal pipeline rather than in it — nothing in the
//! core dataflow blocks on a subscriber being slow or absent.
//!
//! Grounded on original source `event_bus/event_bus.py`'s `EventBus`
//! (ZMQ PUB/PULL broker, `Event`/`EventType` shape, periodic heartbeat)
//! and `event_bus/data_collector.py`'s SQLite storage, reimplemented per
//! spec.md §9's composition-root redesign: no ZMQ dependency exists in
//! this crate's stack, so the PUB/PULL broker becomes an in-process
//! `tokio::sync::broadcast` fan-out that any task in the engine can
//! subscribe to, and the SQLite sink becomes an optional subscriber
//! rather than a separate process.

pub mod collector;
pub mod schema;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use collector::EventCollector;
pub use schema::{EventSchemaValidator, ValidationError};

/// Topic prefix used for every event published on the bus (original's
/// `"bitten.{event_type}"`, renamed to match this crate).
pub const TOPIC_PREFIX: &str = "elite_guard.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SignalGenerated,
    SignalExpired,
    FireCommand,
    TradeExecuted,
    TradeConfirmed,
    BalanceUpdate,
    SystemHealth,
    UserAction,
    MarketData,
    PatternDetected,
}

impl EventType {
    pub fn wire_name(self) -> &'static str {
        match self {
            EventType::SignalGenerated => "signal_generated",
            EventType::SignalExpired => "signal_expired",
            EventType::FireCommand => "fire_command",
            EventType::TradeExecuted => "trade_executed",
            EventType::TradeConfirmed => "trade_confirmed",
            EventType::BalanceUpdate => "balance_update",
            EventType::SystemHealth => "system_health",
            EventType::UserAction => "user_action",
            EventType::MarketData => "market_data",
            EventType::PatternDetected => "pattern_detected",
        }
    }

    pub fn topic(self) -> String {
        format!("{TOPIC_PREFIX}{}", self.wire_name())
    }
}

/// One event on the bus. `data` is a free-form JSON payload whose shape
/// is checked against [`EventSchemaValidator`] at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: Value,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>, data: Value, now: DateTime<Utc>) -> Self {
        Event {
            event_type,
            timestamp: now,
            source: source.into(),
            data,
            correlation_id: None,
            user_id: None,
            session_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct EventBusStats {
    pub events_published: AtomicU64,
    pub events_dropped_lagged: AtomicU64,
    pub last_event_unix_ms: AtomicU64,
}

/// In-process broker. Every `publish` validates the event's shape
/// against its schema (original's `validate_event` gate before
/// `send_multipart`) and fans it out to every live subscriber; a
/// subscriber that falls behind the broadcast channel's capacity loses
/// its oldest unread events rather than blocking the publisher
/// (`broadcast::error::RecvError::Lagged`), matching the "events are
/// best-effort, the core pipeline never blocks on them" design.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    validator: EventSchemaValidator,
    stats: EventBusStats,
}

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

impl EventBus {
    pub fn new() -> Self {
        EventBus::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender, validator: EventSchemaValidator::new(), stats: EventBusStats::default() }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Validates then publishes. A schema failure is logged and the
    /// event is dropped rather than propagated as an error — a bad
    /// event bus payload must never fail the caller's real work
    /// (signal publication, command dispatch).
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.validator.validate(&event) {
            warn!(event_type = event.event_type.wire_name(), error = %e, "dropping invalid event");
            return;
        }
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);
        self.stats.last_event_unix_ms.store(event.timestamp.timestamp_millis().max(0) as u64, Ordering::Relaxed);
        let topic = event.event_type.topic();
        match self.sender.send(event) {
            Ok(subscriber_count) => debug!(topic, subscriber_count, "published event"),
            Err(_) => debug!(topic, "published event with no subscribers"),
        }
    }

    pub fn events_published(&self) -> u64 {
        self.stats.events_published.load(Ordering::Relaxed)
    }

    /// Periodic heartbeat (original's `_heartbeat_loop`, published as a
    /// `system_health` event). Runs until the bus is dropped; intended
    /// to be spawned once by the engine alongside the broker.
    pub async fn run_heartbeat(&self, component: &str, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let data = serde_json::json!({
                "component": component,
                "status": "running",
            });
            self.publish(Event::new(EventType::SystemHealth, component, data, now));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_uses_crate_prefix() {
        assert_eq!(EventType::SignalGenerated.topic(), "elite_guard.signal_generated");
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let now = Utc::now();
        let data = serde_json::json!({
            "signal_id": "ELITE_GUARD_EURUSD_1",
            "symbol": "EURUSD",
            "direction": "BUY",
            "confidence": 82.0,
            "pattern_type": "liquidity_sweep_reversal",
        });
        bus.publish(Event::new(EventType::SignalGenerated, "publisher", data, now));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::SignalGenerated);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn invalid_event_is_dropped_not_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let now = Utc::now();
        // Missing required fields for signal_generated.
        let data = serde_json::json!({ "symbol": "EURUSD" });
        bus.publish(Event::new(EventType::SignalGenerated, "publisher", data, now));
        assert_eq!(bus.events_published(), 0);
        assert!(rx.try_recv().is_err());
    }
}
