//! Extreme-chop filter (§4.D step 1): skip a symbol's whole scan cycle
//! when the last 20 M5 bars show almost no net movement relative to
//! their range.

use crate::model::Candle;

const WINDOW: usize = 20;
const CHOP_RATIO_THRESHOLD: f64 = 0.1;
const NET_MOVE_LOOKBACK: usize = 6;

/// Returns `true` if the symbol should be skipped this cycle.
pub fn is_extreme_chop(m5: &[Candle]) -> bool {
    if m5.len() < NET_MOVE_LOOKBACK {
        return false;
    }
    let window_len = m5.len().min(WINDOW);
    let window = &m5[m5.len() - window_len..];
    let high = window.iter().fold(f64::MIN, |a, c| a.max(c.high));
    let low = window.iter().fold(f64::MAX, |a, c| a.min(c.low));
    let range = high - low;
    if range <= 0.0 {
        return true;
    }
    let last = window.last().unwrap().close;
    let back = window[window.len() - NET_MOVE_LOOKBACK].close;
    let ratio = (last - back).abs() / range;
    ratio < CHOP_RATIO_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: f64, l: f64, c: f64) -> Candle {
        Candle { open: c, high: h, low: l, close: c, volume: 1.0, bucket_start_ts: 0 }
    }

    #[test]
    fn chop_ratio_below_threshold_skips() {
        // range = 0.0020, |close[-1]-close[-6]| = 0.00015 -> ratio 0.075 < 0.1
        let mut bars: Vec<Candle> = (0..14).map(|_| bar(1.0820, 1.0800, 1.0810)).collect();
        for i in 0..6 {
            bars.push(bar(1.0820, 1.0800, 1.08100 + i as f64 * 0.00003));
        }
        assert!(is_extreme_chop(&bars));
    }

    #[test]
    fn trending_market_is_not_chop() {
        let bars: Vec<Candle> = (0..20).map(|i| bar(1.0820 + i as f64 * 0.0005, 1.0800 + i as f64 * 0.0005, 1.0810 + i as f64 * 0.0005)).collect();
        assert!(!is_extreme_chop(&bars));
    }
}
