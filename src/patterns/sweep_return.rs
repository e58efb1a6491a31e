//! Sweep and Return (SRL) (§4.C). Grounded on original source
//! `crypto_smc_patterns.py`'s sweep-and-return family; spec.md §9 treats
//! `SWEEP_RETURN`/`SWEEP_AND_RETURN` as one alias, see [`crate::model::Pattern::SweepAndReturn`].

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Session, Timeframe};
use crate::patterns::DetectorInput;
use crate::symbols::pip_size_for;

const LOOKBACK: usize = 10;
const MIN_M5_BARS: usize = 12;
const MIN_WICK_FRACTION: f64 = 0.6;
const SL_BEYOND_EXTREME_PIPS: f64 = 5.0;
const TP_RANGE_FRACTION: f64 = 0.6;

pub fn detect_sweep_and_return(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m5.len() < MIN_M5_BARS {
        return None;
    }
    let bars = input.m5;
    let last = bars.last()?;
    let prior_window = &bars[bars.len() - 1 - LOOKBACK..bars.len() - 1];
    let swing_high = prior_window.iter().fold(f64::MIN, |a, c| a.max(c.high));
    let swing_low = prior_window.iter().fold(f64::MAX, |a, c| a.min(c.low));

    let bar_range = last.high - last.low;
    if bar_range <= 0.0 {
        return None;
    }

    let pierced_high = last.high > swing_high && last.close < swing_high;
    let pierced_low = last.low < swing_low && last.close > swing_low;

    let (direction, sweep_distance, wick_fraction) = if pierced_high {
        let upper_wick = last.high - last.close.max(last.open);
        (Direction::Sell, last.high - swing_high, upper_wick / bar_range)
    } else if pierced_low {
        let lower_wick = last.close.min(last.open) - last.low;
        (Direction::Buy, swing_low - last.low, lower_wick / bar_range)
    } else {
        return None;
    };

    if wick_fraction < MIN_WICK_FRACTION {
        return None;
    }

    let pip_size = pip_size_for(input.pair);
    let sweep_pips = sweep_distance / pip_size;
    let sweep_bonus = (sweep_pips * 1.5).min(15.0);
    let wick_bonus = (wick_fraction * 20.0).min(20.0);
    let rejection_strength = ((last.close - (last.high + last.low) / 2.0).abs() / (bar_range / 2.0)).min(1.0);
    let rejection_bonus = rejection_strength * 10.0;
    let session_bonus = match input.session {
        Session::Overlap => 10.0,
        Session::London | Session::Ny => 6.0,
        _ => 3.0,
    };

    let base = 55.0 + sweep_bonus + wick_bonus + rejection_bonus + session_bonus;
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    // Mirrors the liquidity sweep convention this pattern shares a family
    // with: SL 5 pips beyond the swept swing extreme, TP at 60% of the
    // swing range being reclaimed.
    let swept_extreme = match direction {
        Direction::Sell => swing_high,
        Direction::Buy => swing_low,
    };
    let stop_price = match direction {
        Direction::Sell => swept_extreme + SL_BEYOND_EXTREME_PIPS * pip_size,
        Direction::Buy => swept_extreme - SL_BEYOND_EXTREME_PIPS * pip_size,
    };
    let sl_pips = (last.close - stop_price).abs() / pip_size;
    let swing_range_pips = (swing_high - swing_low) / pip_size;
    let tp_pips = swing_range_pips * TP_RANGE_FRACTION;

    let mut metadata = HashMap::new();
    metadata.insert("sweep_pips".to_string(), sweep_pips);
    metadata.insert("wick_fraction".to_string(), wick_fraction);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::SweepAndReturn,
        direction,
        input.pair,
        last.close,
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

    fn flat(ts: i64, c: f64) -> Candle {
        Candle { open: c, high: c + 0.0002, low: c - 0.0002, close: c, volume: 10.0, bucket_start_ts: ts }
    }

    #[test]
    fn resistance_sweep_emits_sell() {
        let mut bars: Vec<Candle> = (0..11).map(|i| flat(i * 300, 1.0850)).collect();
        // Final bar pierces the prior swing high (1.0852) then rejects hard back down.
        bars.push(Candle {
            open: 1.0851,
            high: 1.0865,
            low: 1.0848,
            close: 1.0850,
            volume: 10.0,
            bucket_start_ts: 11 * 300,
        });
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        let signal = detect_sweep_and_return(input, 0.0).expect("expected sweep-and-return");
        assert_eq!(signal.direction, Direction::Sell);
    }

    #[test]
    fn weak_wick_returns_none() {
        let mut bars: Vec<Candle> = (0..11).map(|i| flat(i * 300, 1.0850)).collect();
        bars.push(Candle {
            open: 1.0851,
            high: 1.0865,
            low: 1.0848,
            close: 1.0862,
            volume: 10.0,
            bucket_start_ts: 11 * 300,
        });
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        assert!(detect_sweep_and_return(input, 0.0).is_none());
    }
}
