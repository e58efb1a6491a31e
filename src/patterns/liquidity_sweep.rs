//! Liquidity Sweep Reversal (§4.C). Grounded on original source
//! `elite_guard_engine.py::detect_liquidity_sweep_reversal`.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Timeframe};
use crate::patterns::{mean, DetectorInput};
use crate::symbols::pip_size_for;

const MIN_BARS: usize = 3;
const PREFERRED_BARS: usize = 20;
const MIN_PIP_MOVEMENT: f64 = 15.0;
const MIN_VOLUME_SURGE: f64 = 1.5;
const SL_BEYOND_EXTREME_PIPS: f64 = 5.0;
const TP_RANGE_FRACTION: f64 = 0.6;

pub fn detect_liquidity_sweep_reversal(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m1.len() < MIN_BARS {
        return None;
    }
    let window_len = input.m1.len().min(PREFERRED_BARS);
    let window = &input.m1[input.m1.len() - window_len..];
    if window.len() < 5 {
        return None;
    }
    let recent5 = &window[window.len() - 5..];
    let recent_high = recent5.iter().fold(f64::MIN, |a, c| a.max(c.high));
    let recent_low = recent5.iter().fold(f64::MAX, |a, c| a.min(c.low));

    let pip_size = pip_size_for(input.pair);
    let pip_movement = (recent_high - recent_low) / pip_size;
    if pip_movement < MIN_PIP_MOVEMENT {
        return None;
    }

    let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
    let lookback = volumes.len().min(10);
    let avg_volume = mean(&volumes[volumes.len() - lookback..]);
    let recent_volume = recent5.last()?.volume;
    if avg_volume <= 0.0 {
        return None;
    }
    let volume_surge = recent_volume / avg_volume;
    if volume_surge < MIN_VOLUME_SURGE {
        return None;
    }

    let latest = window.last()?;
    let prev3 = window.get(window.len().saturating_sub(4)).copied().unwrap_or(*latest);

    let direction = if (latest.close - recent_high).abs() < f64::EPSILON || latest.close > prev3.close
    {
        Direction::Sell
    } else if (latest.close - recent_low).abs() < f64::EPSILON || latest.close < prev3.close {
        Direction::Buy
    } else {
        return None;
    };

    let movement_strength = (pip_movement / 40.0 * 40.0).min(40.0);
    let surge_tier = match volume_surge {
        s if s >= 3.0 => 30.0,
        s if s >= 2.0 => 20.0,
        _ => 10.0,
    };
    let session_tier = match input.session {
        crate::model::Session::Overlap => 20.0,
        crate::model::Session::London | crate::model::Session::Ny => 14.0,
        crate::model::Session::Asian => 8.0,
        crate::model::Session::OffHours => 4.0,
    };
    let trend_aligned = match direction {
        Direction::Buy => latest.close > prev3.close,
        Direction::Sell => latest.close < prev3.close,
    };
    let trend_bonus = if trend_aligned { 10.0 } else { 0.0 };

    let base = movement_strength + surge_tier + session_tier + trend_bonus;
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    // §4.C: SL 5 pips beyond the swept extreme, TP at 60% of the sweep range.
    let swept_extreme = match direction {
        Direction::Sell => recent_high,
        Direction::Buy => recent_low,
    };
    let stop_price = match direction {
        Direction::Sell => swept_extreme + SL_BEYOND_EXTREME_PIPS * pip_size,
        Direction::Buy => swept_extreme - SL_BEYOND_EXTREME_PIPS * pip_size,
    };
    let sl_pips = (latest.close - stop_price).abs() / pip_size;
    let tp_pips = pip_movement * TP_RANGE_FRACTION;

    let mut metadata = HashMap::new();
    metadata.insert("pip_movement".to_string(), pip_movement);
    metadata.insert("volume_surge".to_string(), volume_surge);
    metadata.insert("recent_high".to_string(), recent_high);
    metadata.insert("recent_low".to_string(), recent_low);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::LiquiditySweepReversal,
        direction,
        input.pair,
        latest.close,
        jittered.max(Pattern::LiquiditySweepReversal.base_score()),
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

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle { open: o, high: h, low: l, close: c, volume: v, bucket_start_ts: ts }
    }

    #[test]
    fn detects_buy_sweep_on_low_close_with_volume_surge() {
        let mut bars = Vec::new();
        for i in 0..15 {
            bars.push(bar(i * 60, 1.0850, 1.0851, 1.0849, 1.0850, 100.0));
        }
        // Last five bars sweep down to a 16-pip range and close at the low
        // with a volume surge on the final bar.
        bars.push(bar(900, 1.0850, 1.0851, 1.0845, 1.0847, 100.0));
        bars.push(bar(960, 1.0847, 1.0848, 1.0840, 1.0842, 100.0));
        bars.push(bar(1020, 1.0842, 1.0843, 1.0836, 1.0838, 100.0));
        bars.push(bar(1080, 1.0838, 1.0839, 1.0830, 1.0834, 100.0));
        bars.push(bar(1140, 1.0834, 1.0835, 1.0820, 1.0820, 400.0));

        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        let signal = detect_liquidity_sweep_reversal(input, 0.0);
        let signal = signal.expect("expected a sweep signal");
        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.base_confidence >= 75.0);
    }

    #[test]
    fn insufficient_data_returns_none() {
        let bars = vec![bar(0, 1.08, 1.081, 1.079, 1.080, 10.0)];
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        assert!(detect_liquidity_sweep_reversal(input, 0.0).is_none());
    }
}
