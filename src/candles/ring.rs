//! Bounded per-symbol/timeframe candle ring (§3 invariants: `len(ring) ≤
//! capacity`, no duplicate `bucket_start_ts` among finalized bars).
//!
//! Grounded on the teacher's `VecDeque`-backed bounded-history idiom
//! (`risk.rs::VaRCalculator::historical_pnl`, `KellyCalculator::win_history`).

use std::collections::VecDeque;

use crate::model::Candle;

#[derive(Debug, Clone)]
pub struct CandleRing {
    capacity: usize,
    bars: VecDeque<Candle>,
}

impl CandleRing {
    pub fn new(capacity: usize) -> Self {
        CandleRing { capacity, bars: VecDeque::with_capacity(capacity) }
    }

    /// Pushes a completed, immutable bar. Drops the oldest if at capacity.
    pub fn push_completed(&mut self, candle: Candle) {
        debug_assert!(
            self.bars.back().map_or(true, |b| b.bucket_start_ts != candle.bucket_start_ts),
            "duplicate bucket_start_ts pushed to finalized ring"
        );
        if self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(candle);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The closed bars, oldest first. Does not include any forming bar.
    pub fn closed(&self) -> &VecDeque<Candle> {
        &self.bars
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.back()
    }

    /// Last `n` closed bars, oldest first; fewer than `n` if unavailable.
    pub fn last_n(&self, n: usize) -> Vec<Candle> {
        let len = self.bars.len();
        let skip = len.saturating_sub(n);
        self.bars.iter().skip(skip).copied().collect()
    }

    /// A detector-facing view: closed bars plus an optional currently
    /// forming bar appended last (§4.B: "may be presented to detectors
    /// as the last element... must be removed/replaced on the next tick").
    pub fn view_with_forming(&self, forming: Option<Candle>) -> Vec<Candle> {
        let mut v: Vec<Candle> = self.bars.iter().copied().collect();
        if let Some(f) = forming {
            v.push(f);
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64) -> Candle {
        Candle { open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0, bucket_start_ts: ts }
    }

    #[test]
    fn ring_respects_capacity() {
        let mut ring = CandleRing::new(3);
        for i in 0..5 {
            ring.push_completed(candle(i * 60));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.last().unwrap().bucket_start_ts, 240);
    }

    #[test]
    fn last_n_returns_fewer_when_unavailable() {
        let mut ring = CandleRing::new(200);
        ring.push_completed(candle(0));
        ring.push_completed(candle(60));
        assert_eq!(ring.last_n(10).len(), 2);
    }
}
