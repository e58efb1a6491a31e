//! Order Block Bounce (§4.C). Grounded on original source
//! `elite_guard_engine.py::detect_order_block_bounce`.

use std::collections::HashMap;

use crate::model::{Direction, Pattern, PatternSignal, Session, Timeframe};
use crate::patterns::DetectorInput;
use crate::symbols::pip_size_for;

const MIN_M5_BARS: usize = 10;
const ZONE_FRACTION: f64 = 0.25;
const PROXIMITY_FRACTION: f64 = 0.10;
const SL_BEYOND_LEVEL_PIPS: f64 = 5.0;
const TP_RANGE_FRACTION: f64 = 0.6;

pub fn detect_order_block_bounce(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m5.len() < MIN_M5_BARS {
        return None;
    }
    let window = &input.m5[input.m5.len() - MIN_M5_BARS..];
    let high5 = window.iter().fold(f64::MIN, |a, c| a.max(c.high));
    let low5 = window.iter().fold(f64::MAX, |a, c| a.min(c.low));
    let range = high5 - low5;
    if range <= 0.0 {
        return None;
    }
    let current = window.last()?.close;

    let direction = if current <= low5 + ZONE_FRACTION * range {
        Direction::Buy
    } else if current >= high5 - ZONE_FRACTION * range {
        Direction::Sell
    } else {
        return None;
    };

    let level = match direction {
        Direction::Buy => low5,
        Direction::Sell => high5,
    };
    let proximity = 1.0 - ((current - level).abs() / (range * ZONE_FRACTION)).min(1.0);
    let proximity_bonus = proximity * 15.0;
    let range_bonus = (range / (range + 0.0020) * 10.0).min(10.0);
    let session_bonus = match input.session {
        Session::Overlap => 12.0,
        Session::London | Session::Ny => 8.0,
        Session::Asian => 4.0,
        Session::OffHours => 2.0,
    };
    let proximity_threshold = range * PROXIMITY_FRACTION;
    let touch_count = window.iter().filter(|c| (c.close - level).abs() <= proximity_threshold).count();
    let touch_bonus = (touch_count as f64 * 3.0).min(9.0);

    let base = Pattern::OrderBlockBounce.base_score() + proximity_bonus + range_bonus + session_bonus
        + touch_bonus
        - 20.0; // re-center so a clean touch scores near base_score, not base+46
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    // Order block bounce has no spec-given formula; mirror the liquidity
    // sweep convention: SL 5 pips beyond the block edge the bounce rests on,
    // TP at 60% of the block's own range toward the opposite edge.
    let pip_size = pip_size_for(input.pair);
    let stop_price = match direction {
        Direction::Buy => level - SL_BEYOND_LEVEL_PIPS * pip_size,
        Direction::Sell => level + SL_BEYOND_LEVEL_PIPS * pip_size,
    };
    let sl_pips = (current - stop_price).abs() / pip_size;
    let tp_pips = (range / pip_size) * TP_RANGE_FRACTION;

    let mut metadata = HashMap::new();
    metadata.insert("high5".to_string(), high5);
    metadata.insert("low5".to_string(), low5);
    metadata.insert("range".to_string(), range);
    metadata.insert("touch_count".to_string(), touch_count as f64);
    metadata.insert("sl_pips".to_string(), sl_pips);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::OrderBlockBounce,
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
    fn buy_near_low_of_band() {
        let mut bars: Vec<Candle> = (0..9).map(|i| bar(i * 300, 1.0900, 1.0800, 1.0850)).collect();
        bars.push(bar(9 * 300, 1.0900, 1.0800, 1.0810)); // close near low5
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        let signal = detect_order_block_bounce(input, 0.0).expect("expected bounce");
        assert_eq!(signal.direction, Direction::Buy);
    }

    #[test]
    fn mid_band_price_emits_nothing() {
        let bars: Vec<Candle> = (0..10).map(|i| bar(i * 300, 1.0900, 1.0800, 1.0850)).collect();
        let input = DetectorInput { pair: "EURUSD", m1: &[], m5: &bars, m15: &[], session: Session::London };
        assert!(detect_order_block_bounce(input, 0.0).is_none());
    }
}
