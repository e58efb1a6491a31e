//! TTL-cache-by-bucket for consensus results (§4.E: "cached per
//! `(symbol, 15s bucket)`"). Grounded on the teacher's
//! `route_quality/metrics.rs` bucket-keyed cache idiom (before removal).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::Consensus;

const BUCKET_SECS: i64 = 15;

fn bucket_for(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(BUCKET_SECS)
}

pub struct ConsensusCache {
    entries: Mutex<HashMap<(String, i64), Consensus>>,
}

impl ConsensusCache {
    pub fn new() -> Self {
        ConsensusCache { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, symbol: &str, now: DateTime<Utc>) -> Option<Consensus> {
        self.entries.lock().get(&(symbol.to_string(), bucket_for(now))).cloned()
    }

    pub fn put(&self, symbol: &str, now: DateTime<Utc>, consensus: Consensus) {
        let mut entries = self.entries.lock();
        entries.insert((symbol.to_string(), bucket_for(now)), consensus);
        // Bound the cache: drop anything outside the current/previous bucket.
        let current = bucket_for(now);
        entries.retain(|(_, b), _| *b >= current - 1);
    }
}

impl Default for ConsensusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consensus() -> Consensus {
        Consensus { median_price: 1.085, confidence: 90.0, outlier_count: 0, source_count: 4, timestamp: Utc::now() }
    }

    #[test]
    fn same_bucket_hits_cache() {
        let cache = ConsensusCache::new();
        let now = Utc::now();
        cache.put("EURUSD", now, consensus());
        assert!(cache.get("EURUSD", now).is_some());
    }

    #[test]
    fn different_symbol_misses() {
        let cache = ConsensusCache::new();
        let now = Utc::now();
        cache.put("EURUSD", now, consensus());
        assert!(cache.get("GBPUSD", now).is_none());
    }
}
