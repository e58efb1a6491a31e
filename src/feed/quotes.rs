//! Debounced quotes snapshot (§4.A): updated on every tick, but only
//! handed to the Exit FSM's drive entry point at most once per 100ms,
//! decoupling exit evaluation from scoring throughput.
//!
//! Grounded on `edge/client.rs`'s `ReorderBuffer`: a bounded, timestamped
//! structure drained on a cadence rather than per-event.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub last_update: Instant,
}

pub struct QuotesCache {
    quotes: Mutex<HashMap<String, Quote>>,
    last_drive: Mutex<Instant>,
    debounce: Duration,
}

impl QuotesCache {
    pub fn new(debounce: Duration) -> Self {
        QuotesCache {
            quotes: Mutex::new(HashMap::new()),
            last_drive: Mutex::new(Instant::now() - debounce),
            debounce,
        }
    }

    pub fn update(&self, symbol: &str, bid: f64, ask: f64) {
        let mut quotes = self.quotes.lock();
        quotes.insert(
            symbol.to_string(),
            Quote { bid, ask, last_update: Instant::now() },
        );
    }

    /// Returns the subset of quotes intersecting `managed_symbols` if the
    /// debounce interval has elapsed since the last drive, `None`
    /// otherwise. The caller uses the result to drive the Exit FSM.
    pub fn drain_for_drive(&self, managed_symbols: &[String]) -> Option<HashMap<String, Quote>> {
        let mut last_drive = self.last_drive.lock();
        if last_drive.elapsed() < self.debounce {
            return None;
        }
        *last_drive = Instant::now();
        let quotes = self.quotes.lock();
        Some(
            managed_symbols
                .iter()
                .filter_map(|s| quotes.get(s).map(|q| (s.clone(), *q)))
                .collect(),
        )
    }

    /// Drops quotes whose last update is older than `stale_threshold`
    /// (default 5 minutes per §4.A), letting the Exit FSM's direction
    /// gate unlock rather than evaluate against a stale price.
    pub fn mark_stale_positions(&self, stale_threshold: Duration) {
        let mut quotes = self.quotes.lock();
        let now = Instant::now();
        quotes.retain(|_, q| now.duration_since(q.last_update) < stale_threshold);
    }

    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes.lock().get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_blocks_immediate_second_drive() {
        let cache = QuotesCache::new(Duration::from_millis(100));
        cache.update("EURUSD", 1.08, 1.0802);
        let managed = vec!["EURUSD".to_string()];
        let first = cache.drain_for_drive(&managed);
        assert!(first.is_some());
        let second = cache.drain_for_drive(&managed);
        assert!(second.is_none());
    }
}
