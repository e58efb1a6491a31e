//! VCB (volatility-compression-breakout) Breakout (§4.C). Grounded on
//! original source `crypto_smc_patterns.py`'s compression/breakout scan,
//! restricted per spec to EURUSD/GBPUSD during LONDON/OVERLAP.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Session, Timeframe};
use crate::patterns::{atr, DetectorInput};
use crate::symbols::pip_size_for;

const MIN_M1_BARS: usize = 20;
const MIN_M5_BARS: usize = 10;
const MIN_COMPRESSION_BARS: usize = 5;
const MAX_COMPRESSION_BARS: usize = 15;
/// Compression quality requires `range/ATR` below this ratio.
const COMPRESSION_RATIO_THRESHOLD: f64 = 1.5;
const MIN_BREAKOUT_STRENGTH: f64 = 0.3;
const MOMENTUM_ALIGNMENT_FLOOR: f64 = 0.6;
const SL_BEYOND_BAND_PIPS: f64 = 3.0;

fn eligible_pair_session(pair: &str, session: Session) -> bool {
    matches!(pair, "EURUSD" | "GBPUSD") && matches!(session, Session::London | Session::Overlap)
}

struct Compression {
    high: f64,
    low: f64,
    range: f64,
    quality: f64,
}

/// Scans compression windows of length `[MIN_COMPRESSION_BARS,
/// MAX_COMPRESSION_BARS]` ending at the last ATR-eligible bar, returning
/// the highest-quality (tightest relative-to-ATR) one found.
fn best_compression(m5: &[Candle5], atr_value: f64) -> Option<Compression> {
    let mut best: Option<Compression> = None;
    for len in MIN_COMPRESSION_BARS..=MAX_COMPRESSION_BARS.min(m5.len()) {
        let window = &m5[m5.len() - len..];
        let high = window.iter().fold(f64::MIN, |a, c| a.max(c.high));
        let low = window.iter().fold(f64::MAX, |a, c| a.min(c.low));
        let range = high - low;
        if atr_value <= 0.0 {
            continue;
        }
        let ratio = range / atr_value;
        if ratio >= COMPRESSION_RATIO_THRESHOLD {
            continue;
        }
        let quality = ((COMPRESSION_RATIO_THRESHOLD - ratio) / COMPRESSION_RATIO_THRESHOLD * 100.0).min(100.0);
        let better = best.as_ref().map_or(true, |b| quality > b.quality);
        if better {
            best = Some(Compression { high, low, range, quality });
        }
    }
    best
}

type Candle5 = crate::model::Candle;

pub fn detect_vcb_breakout(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if !eligible_pair_session(input.pair, input.session) {
        return None;
    }
    if input.m1.len() < MIN_M1_BARS || input.m5.len() < MIN_M5_BARS {
        return None;
    }

    let atr_value = atr(input.m5, 14)?;
    let compression = best_compression(input.m5, atr_value)?;

    let min_strength = if compression.quality > 80.0 { MIN_BREAKOUT_STRENGTH * 1.15 } else { MIN_BREAKOUT_STRENGTH };
    let required_move = min_strength * compression.range;

    let current_close = input.m1.last()?.close;
    let direction = if current_close > compression.high + required_move {
        Direction::Buy
    } else if current_close < compression.low - required_move {
        Direction::Sell
    } else {
        return None;
    };

    let recent5 = &input.m1[input.m1.len() - 5..];
    let aligned = recent5
        .windows(2)
        .filter(|w| match direction {
            Direction::Buy => w[1].close >= w[0].close,
            Direction::Sell => w[1].close <= w[0].close,
        })
        .count();
    let alignment_ratio = aligned as f64 / (recent5.len() - 1) as f64;
    if alignment_ratio < MOMENTUM_ALIGNMENT_FLOOR {
        return None;
    }

    let pip_size = pip_size_for(input.pair);
    let breakout_strength_pips = match direction {
        Direction::Buy => (current_close - compression.high) / pip_size,
        Direction::Sell => (compression.low - current_close) / pip_size,
    };
    let strength_bonus = (breakout_strength_pips * 1.0).min(15.0);

    let m1_volumes: Vec<f64> = input.m1.iter().rev().take(10).map(|c| c.volume).collect();
    let avg_volume = crate::patterns::mean(&m1_volumes);
    let volume_surge = if avg_volume > 0.0 { input.m1.last()?.volume / avg_volume } else { 1.0 };
    let volume_bonus = ((volume_surge - 1.0) * 10.0).clamp(0.0, 10.0);

    let session_bonus = if matches!(input.session, Session::Overlap) { 6.0 } else { 3.0 };

    let quality_component = compression.quality * 0.1; // 0-10
    let base = 70.0 + quality_component + strength_bonus * 0.5 + volume_bonus + session_bonus;
    let jittered = (base * (1.0 + jitter)).clamp(70.0, 100.0);

    // No spec-given formula; a compression breakout's natural target is
    // the measured move (the compression range projected from the
    // breakout point), stopped just beyond the opposite band edge.
    let range_pips = compression.range / pip_size;
    let stop_price = match direction {
        Direction::Buy => compression.low - SL_BEYOND_BAND_PIPS * pip_size,
        Direction::Sell => compression.high + SL_BEYOND_BAND_PIPS * pip_size,
    };
    let sl_pips = (current_close - stop_price).abs() / pip_size;
    let tp_pips = range_pips;

    let mut metadata = HashMap::new();
    metadata.insert("compression_quality".to_string(), compression.quality);
    metadata.insert("breakout_strength_pips".to_string(), breakout_strength_pips);
    metadata.insert("alignment_ratio".to_string(), alignment_ratio);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::VcbBreakout,
        direction,
        input.pair,
        current_close,
        jittered,
        Timeframe::M1,
    );
    sig.sl_pips = Some(sl_pips);
    sig.tp_pips = Some(tp_pips);
    sig.pattern_metadata = metadata;
    Some(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Candle;

    fn tight(ts: i64, c: f64) -> Candle {
        Candle { open: c, high: c + 0.00005, low: c - 0.00005, close: c, volume: 10.0, bucket_start_ts: ts }
    }

    #[test]
    fn wrong_pair_returns_none() {
        let m5: Vec<Candle> = (0..15).map(|i| tight(i * 300, 1.0800)).collect();
        let m1: Vec<Candle> = (0..20).map(|i| tight(i * 60, 1.0800)).collect();
        let input = DetectorInput { pair: "USDJPY", m1: &m1, m5: &m5, m15: &[], session: Session::London };
        assert!(detect_vcb_breakout(input, 0.0).is_none());
    }

    #[test]
    fn wrong_session_returns_none() {
        let m5: Vec<Candle> = (0..15).map(|i| tight(i * 300, 1.0800)).collect();
        let m1: Vec<Candle> = (0..20).map(|i| tight(i * 60, 1.0800)).collect();
        let input = DetectorInput { pair: "EURUSD", m1: &m1, m5: &m5, m15: &[], session: Session::Asian };
        assert!(detect_vcb_breakout(input, 0.0).is_none());
    }
}
