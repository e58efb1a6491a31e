//! Candle cache persistence (§4.B, §6): periodic atomic snapshot of the
//! last M1/M5/M15 rings per symbol, restored on startup only if younger
//! than 1 hour.
//!
//! Grounded on the teacher's atomic temp-file-then-rename convention
//! used for its own recorder/backtest artifacts, reimplemented here at
//! the scale a candle cache needs (no memmap, no custom binary format).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::Candle;

const MAX_CACHE_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize, Deserialize)]
pub struct CandleCacheFile {
    pub timestamp: DateTime<Utc>,
    pub m1_data: HashMap<String, Vec<Candle>>,
    pub m5_data: HashMap<String, Vec<Candle>>,
    pub m15_data: HashMap<String, Vec<Candle>>,
}

/// Writes `data` to `path` via a temp-file-then-rename, so a crash mid
/// write never leaves a truncated cache file behind. Fails soft: I/O
/// errors are logged and swallowed, matching §4.B "fails-soft on I/O
/// errors" and the broader "propagate nothing" policy (§7).
pub fn save(path: &Path, data: &CandleCacheFile) {
    let tmp = path.with_extension("tmp");
    let result = (|| -> anyhow::Result<()> {
        let serialized = serde_json::to_vec(data)?;
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!(error = %e, "failed to persist candle cache");
    }
}

/// Loads `path` only if its recorded timestamp is younger than one hour;
/// otherwise (or on any error) returns `None` and the caller starts cold.
pub fn load_if_fresh(path: &Path) -> Option<CandleCacheFile> {
    let raw = std::fs::read(path).ok()?;
    let file: CandleCacheFile = serde_json::from_slice(&raw).ok()?;
    let age = Utc::now().signed_duration_since(file.timestamp);
    if age.to_std().ok()? < MAX_CACHE_AGE {
        Some(file)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candles.json");
        let mut m1 = HashMap::new();
        m1.insert(
            "EURUSD".to_string(),
            vec![Candle { open: 1.0, high: 1.1, low: 0.9, close: 1.05, volume: 10.0, bucket_start_ts: 0 }],
        );
        let file = CandleCacheFile { timestamp: Utc::now(), m1_data: m1, m5_data: HashMap::new(), m15_data: HashMap::new() };
        save(&path, &file);
        let loaded = load_if_fresh(&path).unwrap();
        assert_eq!(loaded.m1_data["EURUSD"].len(), 1);
    }

    #[test]
    fn stale_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candles.json");
        let file = CandleCacheFile {
            timestamp: Utc::now() - ChronoDuration::hours(2),
            m1_data: HashMap::new(),
            m5_data: HashMap::new(),
            m15_data: HashMap::new(),
        };
        save(&path, &file);
        assert!(load_if_fresh(&path).is_none());
    }
}
