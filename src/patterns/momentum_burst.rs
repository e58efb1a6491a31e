//! Momentum Burst (§4.C, feature-flagged). Grounded on original source
//! `elite_guard_engine.py`'s momentum-burst scalping detector.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Timeframe};
use crate::patterns::{mean, DetectorInput};
use crate::symbols::pip_size_for;

const MIN_M1_BARS: usize = 5;
const CONSECUTIVE_BARS: usize = 3;
const MIN_CUMULATIVE_PIPS: f64 = 3.0;
const MOMENTUM_SL_PIPS: f64 = 4.0;
const MOMENTUM_TP_CAP_PIPS: f64 = 12.0;

pub fn detect_momentum_burst(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m1.len() < MIN_M1_BARS {
        return None;
    }
    let tail = &input.m1[input.m1.len() - CONSECUTIVE_BARS..];
    let all_up = tail.windows(2).all(|w| w[1].close > w[0].close);
    let all_down = tail.windows(2).all(|w| w[1].close < w[0].close);
    if !all_up && !all_down {
        return None;
    }
    let direction = if all_up { Direction::Buy } else { Direction::Sell };

    let pip_size = pip_size_for(input.pair);
    let cumulative_pips = (tail.last()?.close - tail.first()?.close).abs() / pip_size;
    if cumulative_pips < MIN_CUMULATIVE_PIPS {
        return None;
    }

    let move_bonus = if cumulative_pips >= 8.0 {
        15.0
    } else if cumulative_pips >= 5.0 {
        8.0
    } else {
        0.0
    };

    let volumes: Vec<f64> = input.m1.iter().rev().take(10).map(|c| c.volume).collect();
    let avg_volume = mean(&volumes);
    let latest_volume = tail.last()?.volume;
    let volume_bonus = if avg_volume > 0.0 && latest_volume / avg_volume >= 1.25 { 5.0 } else { 0.0 };

    let base = Pattern::MomentumBurst.base_score() + move_bonus + volume_bonus;
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    // Scalp continuation: target the same move the burst already made,
    // capped to stay a RAPID-mode take-profit; SL is a fixed tight stop
    // since the pattern's edge decays fast.
    let tp_pips = cumulative_pips.min(MOMENTUM_TP_CAP_PIPS);
    let sl_pips = MOMENTUM_SL_PIPS;

    let mut metadata = HashMap::new();
    metadata.insert("cumulative_pips".to_string(), cumulative_pips);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::MomentumBurst,
        direction,
        input.pair,
        tail.last()?.close,
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
    use crate::model::{Candle, Session};

    fn bar(ts: i64, c: f64) -> Candle {
        Candle { open: c, high: c, low: c, close: c, volume: 10.0, bucket_start_ts: ts }
    }

    #[test]
    fn three_up_closes_with_enough_move_emits_buy() {
        let bars = vec![
            bar(0, 1.0800),
            bar(60, 1.0802),
            bar(120, 1.0804),
            bar(180, 1.0806),
            bar(240, 1.0810),
        ];
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        let signal = detect_momentum_burst(input, 0.0).expect("expected burst");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn mixed_direction_returns_none() {
        let bars = vec![bar(0, 1.0800), bar(60, 1.0802), bar(120, 1.0798), bar(180, 1.0805), bar(240, 1.0808)];
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        assert!(detect_momentum_burst(input, 0.0).is_none());
    }
}
