//! Candle Builder (component B, §4.B): per-symbol M1 aggregation,
//! cascading to M5 (×5) and M15 (×3).
//!
//! Net new relative to the teacher (no candle aggregator exists in the
//! source crate); written in the ring/lock idiom of `candles::ring` and
//! `edge::receiver`'s per-symbol `RwLock<HashMap<..>>` state.

use std::collections::HashMap;

use crate::candles::ring::CandleRing;
use crate::model::Candle;

const RING_CAPACITY: usize = 200;

struct SymbolCandles {
    forming_m1: Option<(i64, Candle)>,
    m1: CandleRing,
    m5: CandleRing,
    m15: CandleRing,
}

impl SymbolCandles {
    fn new() -> Self {
        SymbolCandles {
            forming_m1: None,
            m1: CandleRing::new(RING_CAPACITY),
            m5: CandleRing::new(RING_CAPACITY),
            m15: CandleRing::new(RING_CAPACITY),
        }
    }
}

/// Owns every symbol's candle state; the feed thread is its sole writer
/// (spec.md §9: "feed thread is the sole writer to SymbolState's rings").
pub struct CandleBuilder {
    per_symbol: HashMap<String, SymbolCandles>,
}

impl CandleBuilder {
    pub fn new() -> Self {
        CandleBuilder { per_symbol: HashMap::new() }
    }

    /// Feeds one tick. `ts` is the tick's epoch-seconds timestamp.
    pub fn on_tick(&mut self, symbol: &str, mid: f64, volume: f64, ts: i64) {
        let state = self.per_symbol.entry(symbol.to_string()).or_insert_with(SymbolCandles::new);
        let minute = ts.div_euclid(60);
        let minute_start = minute * 60;

        match &mut state.forming_m1 {
            Some((bucket_minute, candle)) if *bucket_minute == minute => {
                candle.apply_tick(mid, volume.max(1.0));
            }
            Some((bucket_minute, candle)) if *bucket_minute < minute => {
                let completed = *candle;
                state.m1.push_completed(completed);
                Self::maybe_cascade(&mut state.m1, &mut state.m5, &mut state.m15);
                state.forming_m1 = Some((minute, Candle::from_tick(minute_start, mid, volume.max(1.0))));
            }
            _ => {
                state.forming_m1 = Some((minute, Candle::from_tick(minute_start, mid, volume.max(1.0))));
            }
        }
    }

    /// Aggregates M1→M5 whenever the M1 ring grows to a multiple of 5,
    /// and M5→M15 whenever the M5 ring has ≥3 bars whose latest bucket
    /// differs from M15's latest (§4.B).
    fn maybe_cascade(m1: &mut CandleRing, m5: &mut CandleRing, m15: &mut CandleRing) {
        if m1.len() > 0 && m1.len() % 5 == 0 {
            let last_five = m1.last_n(5);
            if let Some(agg) = Candle::aggregate(&last_five) {
                let is_new = m5.last().map_or(true, |l| l.bucket_start_ts != agg.bucket_start_ts);
                if is_new {
                    m5.push_completed(agg);
                }
            }
        }
        if m5.len() >= 3 {
            let last_three = m5.last_n(3);
            if let Some(agg) = Candle::aggregate(&last_three) {
                let is_new = m15.last().map_or(true, |l| l.bucket_start_ts != agg.bucket_start_ts);
                if is_new {
                    m15.push_completed(agg);
                }
            }
        }
    }

    /// Detector-facing view of closed M1 bars, with the currently
    /// forming bar appended last per §4.B. Returns `&[]`-equivalent
    /// (empty vec) for an unknown symbol rather than erroring.
    pub fn view_m1(&self, symbol: &str) -> Vec<Candle> {
        match self.per_symbol.get(symbol) {
            Some(s) => s.m1.view_with_forming(s.forming_m1.map(|(_, c)| c)),
            None => Vec::new(),
        }
    }

    pub fn view_m5(&self, symbol: &str) -> Vec<Candle> {
        self.per_symbol.get(symbol).map(|s| s.m5.closed().iter().copied().collect()).unwrap_or_default()
    }

    pub fn view_m15(&self, symbol: &str) -> Vec<Candle> {
        self.per_symbol.get(symbol).map(|s| s.m15.closed().iter().copied().collect()).unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.per_symbol.keys()
    }

    /// Restores a symbol's closed-bar rings from a freshly-loaded cache
    /// file (§4.B "restore rings only if cache timestamp < 1h old"). Bars
    /// are pushed oldest-first, matching the order they were persisted in.
    pub fn seed(&mut self, symbol: &str, m1: Vec<Candle>, m5: Vec<Candle>, m15: Vec<Candle>) {
        let state = self.per_symbol.entry(symbol.to_string()).or_insert_with(SymbolCandles::new);
        for candle in m1 {
            state.m1.push_completed(candle);
        }
        for candle in m5 {
            state.m5.push_completed(candle);
        }
        for candle in m15 {
            state.m15.push_completed(candle);
        }
    }

    /// Snapshots every symbol's closed M1/M5/M15 bars for persistence.
    pub fn snapshot(&self) -> (HashMap<String, Vec<Candle>>, HashMap<String, Vec<Candle>>, HashMap<String, Vec<Candle>>) {
        let mut m1 = HashMap::new();
        let mut m5 = HashMap::new();
        let mut m15 = HashMap::new();
        for (symbol, state) in &self.per_symbol {
            m1.insert(symbol.clone(), state.m1.closed().iter().copied().collect());
            m5.insert(symbol.clone(), state.m5.closed().iter().copied().collect());
            m15.insert(symbol.clone(), state.m15.closed().iter().copied().collect());
        }
        (m1, m5, m15)
    }
}

impl Default for CandleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_m1_bars_produce_one_m5() {
        let mut builder = CandleBuilder::new();
        for minute in 0..5 {
            let base_ts = minute * 60;
            builder.on_tick("EURUSD", 1.0800 + minute as f64 * 0.0001, 10.0, base_ts);
            builder.on_tick("EURUSD", 1.0801 + minute as f64 * 0.0001, 10.0, base_ts + 30);
        }
        // one more tick in minute 5 to close out minute 4's bar
        builder.on_tick("EURUSD", 1.0810, 10.0, 5 * 60);
        let m5 = builder.view_m5("EURUSD");
        assert_eq!(m5.len(), 1);
    }

    #[test]
    fn forming_bar_is_replaced_not_duplicated() {
        let mut builder = CandleBuilder::new();
        builder.on_tick("EURUSD", 1.08, 1.0, 0);
        builder.on_tick("EURUSD", 1.081, 1.0, 30);
        let view = builder.view_m1("EURUSD");
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].close, 1.081);
    }
}
