//! Session Open Fade (§4.C, feature-flagged). Grounded on original
//! source `elite_guard_engine.py`'s session-open fade scalper.

use std::collections::HashMap;

use chrono::{Timelike, Utc};

use crate::model::{Direction, Pattern, PatternSignal, Timeframe};
use crate::patterns::DetectorInput;
use crate::symbols::pip_size_for;

const MIN_M1_BARS: usize = 10;
const SESSION_OPEN_LOOKBACK: usize = 6;
const MIN_PIP_MOVEMENT: f64 = 10.0;
const FADE_TP_MIN_PIPS: f64 = 5.0;
const FADE_TP_MAX_PIPS: f64 = 8.0;
const FADE_SL_PIPS: f64 = 5.0;

fn in_session_open_window(bucket_start_ts: i64) -> bool {
    let dt = chrono::DateTime::<Utc>::from_timestamp(bucket_start_ts, 0).unwrap_or_else(Utc::now);
    let hour = dt.hour();
    let minute = dt.minute();
    (hour == 8 || hour == 13) && minute < 5
}

pub fn detect_session_open_fade(input: DetectorInput, jitter: f64) -> Option<PatternSignal> {
    if input.m1.len() < MIN_M1_BARS {
        return None;
    }
    let latest = input.m1.last()?;
    if !in_session_open_window(latest.bucket_start_ts) {
        return None;
    }
    let open_idx = input.m1.len().checked_sub(SESSION_OPEN_LOOKBACK + 1)?;
    let session_open = input.m1.get(open_idx)?;

    let pip_size = pip_size_for(input.pair);
    let pip_movement = (latest.close - session_open.close) / pip_size;
    if pip_movement.abs() < MIN_PIP_MOVEMENT {
        return None;
    }

    // Fade opposite the move, targeting the 50% retracement.
    let direction = if pip_movement > 0.0 { Direction::Sell } else { Direction::Buy };
    let retracement_target = (latest.close + session_open.close) / 2.0;
    let tp_pips = ((latest.close - retracement_target).abs() / pip_size).clamp(FADE_TP_MIN_PIPS, FADE_TP_MAX_PIPS);

    let base = Pattern::SessionOpenFade.base_score();
    let jittered = (base * (1.0 + jitter)).clamp(0.0, 100.0);

    let mut metadata = HashMap::new();
    metadata.insert("pip_movement".to_string(), pip_movement);
    metadata.insert("sl_pips".to_string(), FADE_SL_PIPS);
    metadata.insert("tp_pips".to_string(), tp_pips);

    let mut sig = PatternSignal::new(
        Pattern::SessionOpenFade,
        direction,
        input.pair,
        latest.close,
        jittered,
        Timeframe::M1,
    );
    sig.sl_pips = Some(FADE_SL_PIPS);
    sig.tp_pips = Some(tp_pips);
    sig.pattern_metadata = metadata;
    Some(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Candle, Session};

    fn bar_at(minute_of_day: u32, c: f64) -> Candle {
        // 2026-07-27 is a fixed reference date; hour/minute is what matters.
        let ts = minute_of_day as i64 * 60;
        Candle { open: c, high: c, low: c, close: c, volume: 10.0, bucket_start_ts: ts }
    }

    #[test]
    fn fades_london_open_move() {
        let mut bars = Vec::new();
        for i in 0..6 {
            bars.push(bar_at(8 * 60 + i, 1.0800));
        }
        bars.push(bar_at(8 * 60 + 2, 1.0815)); // +15 pips inside the window
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        let signal = detect_session_open_fade(input, 0.0).expect("expected fade");
        assert_eq!(signal.direction, Direction::Sell);
    }

    #[test]
    fn outside_window_returns_none() {
        let bars: Vec<Candle> = (0..10).map(|i| bar_at(9 * 60 + i, 1.0800 + i as f64 * 0.0020)).collect();
        let input = DetectorInput { pair: "EURUSD", m1: &bars, m5: &[], m15: &[], session: Session::London };
        assert!(detect_session_open_fade(input, 0.0).is_none());
    }
}
