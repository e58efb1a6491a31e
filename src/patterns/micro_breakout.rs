//! Micro-Breakout Retest (§4.C, feature-flagged). Grounded on original
//! source `elite_guard_engine.py`'s micro-breakout-retest scalper.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Timeframe};
use crate::patterns::DetectorInput;
use crate::symbols::pip_size_for;

const MIN_M1_BARS: usize = 15;
const BREAK_LOOKBACK: usize = 10;
const RETEST_PROXIMITY_PIPS: f64 = 3.0;
const RETEST_TP_PIPS: f64 = 4.5;
const RETEST_SL_PIPS: f64 = 3.0;

pub fn detect_micro_breakout_retest(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m1.len() < MIN_M1_BARS {
        return None;
    }
    let bars = input.m1;
    let pip_size = pip_size_for(input.pair);
    let window = &bars[bars.len() - MIN_M1_BARS..];

    // Find the most recent bar that broke the prior BREAK_LOOKBACK-bar high/low.
    let mut break_level: Option<(f64, Direction)> = None;
    for i in (BREAK_LOOKBACK..window.len()).rev() {
        let prior = &window[i - BREAK_LOOKBACK..i];
        let prior_high = prior.iter().fold(f64::MIN, |a, c| a.max(c.high));
        let prior_low = prior.iter().fold(f64::MAX, |a, c| a.min(c.low));
        if window[i].close > prior_high {
            break_level = Some((prior_high, Direction::Buy));
            break;
        }
        if window[i].close < prior_low {
            break_level = Some((prior_low, Direction::Sell));
            break;
        }
    }
    let (level, direction) = break_level?;

    let latest = window.last()?;
    let distance_pips = (latest.close - level).abs() / pip_size;
    if distance_pips > RETEST_PROXIMITY_PIPS {
        return None;
    }

    let last_two = &window[window.len() - 2..];
    let directional_bias = match direction {
        Direction::Buy => last_two[1].close >= last_two[0].close,
        Direction::Sell => last_two[1].close <= last_two[0].close,
    };
    if !directional_bias {
        return None;
    }

    let proximity_bonus = ((RETEST_PROXIMITY_PIPS - distance_pips) / RETEST_PROXIMITY_PIPS * 6.0).max(0.0);
    let base = Pattern::MicroBreakoutRetest.base_score() + proximity_bonus;
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    let mut metadata = HashMap::new();
    metadata.insert("break_level".to_string(), level);
    metadata.insert("distance_pips".to_string(), distance_pips);
    metadata.insert("sl_pips".to_string(), RETEST_SL_PIPS);
    metadata.insert("tp_pips".to_string(), RETEST_TP_PIPS);

    let mut sig = PatternSignal::new(
        Pattern::MicroBreakoutRetest,
        direction,
        input.pair,
        latest.close,
        jittered,
        Timeframe::M1,
    );
    sig.sl_pips = Some(RETEST_SL_PIPS);
    sig.tp_pips = Some(RETEST_TP_PIPS);
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
    fn breakout_then_retest_emits_buy() {
        let mut bars: Vec<Candle> = Vec::new();
        for i in 0..10 {
            bars.push(bar(i * 60, 1.0800));
        }
        bars.push(bar(10 * 60, 1.0810)); // breaks the 10-bar high (1.0800)
        bars.push(bar(11 * 60, 1.0805));
        bars.push(bar(12 * 60, 1.0802)); // retest near the old level
        bars.push(bar(13 * 60, 1.0803));
        bars.push(bar(14 * 60, 1.0804)); // directional bias up into the retest
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        let signal = detect_micro_breakout_retest(input, 0.0).expect("expected retest");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn no_break_returns_none() {
        let bars: Vec<Candle> = (0..15).map(|i| bar(i * 60, 1.0800)).collect();
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        assert!(detect_micro_breakout_retest(input, 0.0).is_none());
    }
}
