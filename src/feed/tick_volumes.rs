//! Per-symbol tick volume ring (§3 data model: bounded ring, capacity
//! 200). Grounded on original source `elite_guard_engine.py`'s
//! `self.tick_data = defaultdict(lambda: deque(maxlen=200))`; feeds the
//! volume-confirmation and momentum-gate confluence bonuses
//! (`scoring::confluence`), which previously had no live input.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

const TICK_RING_CAPACITY: usize = 200;

pub struct TickVolumeTracker {
    rings: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl TickVolumeTracker {
    pub fn new() -> Self {
        TickVolumeTracker { rings: Mutex::new(HashMap::new()) }
    }

    /// Records a tick's volume for `symbol`, dropping the oldest entry
    /// once the ring is at capacity.
    pub fn record(&self, symbol: &str, volume: f64) {
        let mut rings = self.rings.lock();
        let ring = rings.entry(symbol.to_string()).or_insert_with(VecDeque::new);
        if ring.len() >= TICK_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(volume);
    }

    /// A snapshot of `symbol`'s recent volumes, oldest first. Empty if
    /// the symbol has never had a tick recorded.
    pub fn recent(&self, symbol: &str) -> Vec<f64> {
        self.rings.lock().get(symbol).map(|r| r.iter().copied().collect()).unwrap_or_default()
    }
}

impl Default for TickVolumeTracker {
    fn default() -> Self {
        TickVolumeTracker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_respects_capacity() {
        let tracker = TickVolumeTracker::new();
        for i in 0..250 {
            tracker.record("EURUSD", i as f64);
        }
        let recent = tracker.recent("EURUSD");
        assert_eq!(recent.len(), TICK_RING_CAPACITY);
        assert_eq!(recent.last().copied(), Some(249.0));
    }

    #[test]
    fn unknown_symbol_returns_empty() {
        let tracker = TickVolumeTracker::new();
        assert!(tracker.recent("EURUSD").is_empty());
    }

    #[test]
    fn symbols_are_tracked_independently() {
        let tracker = TickVolumeTracker::new();
        tracker.record("EURUSD", 10.0);
        tracker.record("GBPUSD", 20.0);
        assert_eq!(tracker.recent("EURUSD"), vec![10.0]);
        assert_eq!(tracker.recent("GBPUSD"), vec![20.0]);
    }
}
