//! Fair Value Gap Fill (§4.C). Grounded on original source
//! `elite_guard_engine.py::detect_fair_value_gap_fill`.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Session, Timeframe};
use crate::patterns::DetectorInput;
use crate::symbols::pip_size_for;

const MIN_M5_BARS: usize = 10;
const GAP_PIP_THRESHOLD: f64 = 4.0;
const PROXIMITY_PIPS: f64 = 3.0;
const SL_BEYOND_EDGE_PIPS: f64 = 4.0;

pub fn detect_fair_value_gap_fill(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m5.len() < MIN_M5_BARS {
        return None;
    }
    let pip_size = pip_size_for(input.pair);
    let window = &input.m5[input.m5.len() - MIN_M5_BARS..];

    // Scan 3-bar windows, newest-gap-first, for a bullish or bearish gap.
    let mut found: Option<(f64, f64, f64)> = None; // (gap_low, gap_high, gap_size_pips)
    for w in window.windows(3).rev() {
        let (prev, _mid, _last) = (w[0], w[1], w[2]);
        // Bullish gap candidate: low[i] - high[i-1] > threshold.
        for pair in w.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let gap = (b.low - a.high) / pip_size;
            if gap > GAP_PIP_THRESHOLD {
                found = Some((a.high, b.low, gap));
                break;
            }
            let gap_down = (a.low - b.high) / pip_size;
            if gap_down > GAP_PIP_THRESHOLD {
                found = Some((b.high, a.low, gap_down));
                break;
            }
        }
        if found.is_some() {
            let _ = prev;
            break;
        }
    }
    let (gap_low, gap_high, gap_pips) = found?;
    let midpoint = (gap_low + gap_high) / 2.0;
    let current = window.last()?.close;
    let distance_pips = (current - midpoint).abs() / pip_size;
    if distance_pips > PROXIMITY_PIPS {
        return None;
    }

    let direction = if current < midpoint { Direction::Buy } else { Direction::Sell };

    let gap_bonus = (gap_pips / 10.0 * 15.0).min(15.0);
    let proximity_bonus = ((PROXIMITY_PIPS - distance_pips) / PROXIMITY_PIPS * 10.0).max(0.0);
    let recent_move = (window.last()?.close - window[window.len() - 2].close).abs() / pip_size;
    let movement_bonus = (recent_move * 2.0).min(8.0);
    let session_bonus = match input.session {
        Session::Overlap => 8.0,
        Session::London | Session::Ny => 5.0,
        _ => 2.0,
    };

    let base = Pattern::FairValueGapFill.base_score() + gap_bonus + proximity_bonus + movement_bonus
        + session_bonus
        - 15.0;
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    // No spec-given formula; ground SL/TP in the gap itself: stop just
    // beyond the near edge (the gap failing to fill), target the far edge
    // (the gap filling completely).
    let (near_edge, far_edge) = match direction {
        Direction::Buy => (gap_low, gap_high),
        Direction::Sell => (gap_high, gap_low),
    };
    let stop_price = match direction {
        Direction::Buy => near_edge - SL_BEYOND_EDGE_PIPS * pip_size,
        Direction::Sell => near_edge + SL_BEYOND_EDGE_PIPS * pip_size,
    };
    let sl_pips = (current - stop_price).abs() / pip_size;
    let tp_pips = (far_edge - current).abs() / pip_size;

    let mut metadata = HashMap::new();
    metadata.insert("gap_pips".to_string(), gap_pips);
    metadata.insert("midpoint".to_string(), midpoint);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::FairValueGapFill,
        direction,
        input.pair,
        current,
        jittered,
        Timeframe::M5,
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

    fn bar(ts: i64, h: f64, l: f64, c: f64) -> Candle {
        Candle { open: c, high: h, low: l, close: c, volume: 10.0, bucket_start_ts: ts }
    }

    #[test]
    fn detects_bullish_gap_fill_near_midpoint() {
        let mut bars: Vec<Candle> = (0..7).map(|i| bar(i * 300, 1.0810, 1.0800, 1.0805)).collect();
        bars.push(bar(7 * 300, 1.0810, 1.0805, 1.0808)); // prior bar, high = 1.0810
        bars.push(bar(8 * 300, 1.0825, 1.0820, 1.0822)); // gap: low 1.0820 - high 1.0810 = 10 pips
        bars.push(bar(9 * 300, 1.0817, 1.0813, 1.0815)); // close near midpoint 1.0815, below it
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        let signal = detect_fair_value_gap_fill(input, 0.0).expect("expected fvg fill");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn no_gap_returns_none() {
        let bars: Vec<Candle> = (0..10).map(|i| bar(i * 300, 1.0810, 1.0800, 1.0805)).collect();
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        assert!(detect_fair_value_gap_fill(input, 0.0).is_none());
    }
}
