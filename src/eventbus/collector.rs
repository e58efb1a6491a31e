//! SQLite event collector (§ "Event Bus" component H). Grounded on
//! original source `event_bus/data_collector.py`'s `DataCollector`
//! (`events` table with five indexes, plus a `signal_events` table for
//! fast signal-specific queries), using `rusqlite` per the teacher's own
//! dependency rather than hand-rolling storage.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{Event, EventType};

pub struct EventCollector {
    conn: Mutex<Connection>,
}

impl EventCollector {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                source TEXT NOT NULL,
                correlation_id TEXT,
                user_id TEXT,
                session_id TEXT,
                data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_event_type ON events(event_type);
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp_ms);
            CREATE INDEX IF NOT EXISTS idx_events_source ON events(source);
            CREATE INDEX IF NOT EXISTS idx_events_user_id ON events(user_id);
            CREATE INDEX IF NOT EXISTS idx_events_correlation_id ON events(correlation_id);

            CREATE TABLE IF NOT EXISTS signal_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL REFERENCES events(id),
                signal_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                confidence REAL NOT NULL,
                pattern_type TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signal_events_signal_id ON signal_events(signal_id);
            CREATE INDEX IF NOT EXISTS idx_signal_events_symbol ON signal_events(symbol);",
        )?;
        Ok(EventCollector { conn: Mutex::new(conn) })
    }

    /// Records `event` into the generic `events` table, plus the
    /// `signal_events` fast-query table when it's a signal-generated
    /// event (original's dedicated branch in `_store_event`).
    pub fn record(&self, event: &Event) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        let data_json = serde_json::to_string(&event.data)?;
        conn.execute(
            "INSERT INTO events (event_type, timestamp_ms, source, correlation_id, user_id, session_id, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_type.wire_name(),
                event.timestamp.timestamp_millis(),
                event.source,
                event.correlation_id,
                event.user_id,
                event.session_id,
                data_json,
            ],
        )?;
        if event.event_type == EventType::SignalGenerated {
            let event_id = conn.last_insert_rowid();
            let symbol = event.data.get("symbol").and_then(|v| v.as_str()).unwrap_or_default();
            let direction = event.data.get("direction").and_then(|v| v.as_str()).unwrap_or_default();
            let confidence = event.data.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let pattern_type = event.data.get("pattern_type").and_then(|v| v.as_str()).unwrap_or_default();
            let signal_id = event.data.get("signal_id").and_then(|v| v.as_str()).unwrap_or_default();
            conn.execute(
                "INSERT INTO signal_events (event_id, signal_id, symbol, direction, confidence, pattern_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![event_id, signal_id, symbol, direction, confidence, pattern_type],
            )?;
        }
        Ok(())
    }

    pub fn event_count(&self) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn records_generic_event() {
        let dir = tempfile::tempdir().unwrap();
        let collector = EventCollector::open(&dir.path().join("events.db")).unwrap();
        let event = Event::new(EventType::SystemHealth, "engine", serde_json::json!({"component": "feed", "status": "running"}), Utc::now());
        collector.record(&event).unwrap();
        assert_eq!(collector.event_count().unwrap(), 1);
    }

    #[test]
    fn signal_generated_event_populates_fast_query_table() {
        let dir = tempfile::tempdir().unwrap();
        let collector = EventCollector::open(&dir.path().join("events.db")).unwrap();
        let data = serde_json::json!({
            "signal_id": "ELITE_GUARD_EURUSD_1",
            "symbol": "EURUSD",
            "direction": "BUY",
            "confidence": 82.0,
            "pattern_type": "liquidity_sweep_reversal",
        });
        let event = Event::new(EventType::SignalGenerated, "publisher", data, Utc::now());
        collector.record(&event).unwrap();

        let conn = collector.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM signal_events WHERE symbol = 'EURUSD'", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
