//! Confluence scoring (§4.D step 3): adds bonuses on top of a pattern's
//! base score, then applies the session multiplier and a logarithmic
//! cap near 98.

use crate::model::{Candle, ConfidenceBreakdown, Direction, Session};
use crate::patterns::{atr, mean, sma_close};

const VOLUME_CONFIRM_THRESHOLD: f64 = 1000.0;
const VOLUME_CONFIRM_BONUS: f64 = 3.0;
const TIGHT_SPREAD_PIPS: f64 = 2.5;
const TIGHT_SPREAD_BONUS: f64 = 2.0;
const MTF_FULL_BONUS: f64 = 8.0;
const MTF_FULL_ALIGNMENT: f64 = 0.9;
const MTF_PARTIAL_BONUS: f64 = 4.0;
const MTF_PARTIAL_ALIGNMENT: f64 = 0.6;
const ATR_BAND_LOW: f64 = 0.0003;
const ATR_BAND_HIGH: f64 = 0.0008;
const ATR_BAND_BONUS: f64 = 3.0;
const MOMENTUM_GATE_BONUS: f64 = 5.0;
const MICRO_TREND_BONUS: f64 = 3.0;
const MAX_PAIR_QUALITY_BONUS: f64 = 12.0;
const SESSION_OPTIMAL_MULTIPLIER: f64 = 1.05;
const SOFT_CAP: f64 = 95.0;
const HARD_CAP: f64 = 98.0;

pub struct ConfluenceInputs<'a> {
    pub direction: Direction,
    pub base_score: f64,
    pub session: Session,
    pub is_optimal_pair: bool,
    pub pair_quality_bonus: f64,
    pub recent_tick_volumes: &'a [f64],
    pub spread_pips: f64,
    pub m1: &'a [Candle],
    pub m5: &'a [Candle],
    pub m15: &'a [Candle],
    pub news_penalty: f64,
}

pub struct ConfluenceResult {
    pub final_score: f64,
    pub tf_alignment: f64,
    pub breakdown: ConfidenceBreakdown,
}

fn ma_direction(bars: &[Candle], short: usize, long: usize) -> Option<Direction> {
    let ma_short = sma_close(bars, short)?;
    let ma_long = sma_close(bars, long)?;
    Some(if ma_short >= ma_long { Direction::Buy } else { Direction::Sell })
}

fn momentum_gates_pass(direction: Direction, m1: &[Candle], avg_tick_volume: f64, recent_volume: f64) -> bool {
    if m1.len() < 5 {
        return false;
    }
    let latest = m1.last().unwrap();
    let volume_ok = avg_tick_volume > 0.0 && recent_volume / avg_tick_volume >= 1.25;
    let bar_range = latest.high - latest.low;
    let close_position_ok = if bar_range > 0.0 {
        let pos = (latest.close - latest.low) / bar_range;
        match direction {
            Direction::Buy => pos >= 0.8,
            Direction::Sell => pos <= 0.2,
        }
    } else {
        false
    };
    let five = &m1[m1.len() - 5..];
    let move_pips_ok = (five.last().unwrap().close - five.first().unwrap().close).abs() >= 0.0003;
    let follow_through_ok = match direction {
        Direction::Buy => latest.close >= latest.open,
        Direction::Sell => latest.close <= latest.open,
    };
    volume_ok && close_position_ok && move_pips_ok && follow_through_ok
}

/// Computes the full confluence breakdown and final score for a
/// candidate signal, per §4.D step 3's bullet list in order.
pub fn score(inputs: &ConfluenceInputs) -> ConfluenceResult {
    let mut breakdown = ConfidenceBreakdown { base: inputs.base_score, ..Default::default() };

    if inputs.is_optimal_pair {
        breakdown.session_bonus = (inputs.pair_quality_bonus * 0.5).min(MAX_PAIR_QUALITY_BONUS);
    }

    let avg_tick_volume = mean(inputs.recent_tick_volumes);
    if avg_tick_volume > VOLUME_CONFIRM_THRESHOLD {
        breakdown.volume_bonus = VOLUME_CONFIRM_BONUS;
    }

    if inputs.spread_pips < TIGHT_SPREAD_PIPS {
        breakdown.spread_bonus = TIGHT_SPREAD_BONUS;
    }

    let m1_dir = ma_direction(inputs.m1, 3, 10);
    let m5_dir = ma_direction(inputs.m5, 3, 10);
    let m1_match = m1_dir == Some(inputs.direction);
    let m5_match = m5_dir == Some(inputs.direction);
    let tf_alignment = if m1_match && m5_match {
        breakdown.alignment_bonus = MTF_FULL_BONUS;
        MTF_FULL_ALIGNMENT
    } else if m1_match || m5_match {
        breakdown.alignment_bonus = MTF_PARTIAL_BONUS;
        MTF_PARTIAL_ALIGNMENT
    } else {
        0.0
    };

    if let Some(atr10) = atr(inputs.m5, 10) {
        if (ATR_BAND_LOW..=ATR_BAND_HIGH).contains(&atr10) {
            breakdown.volatility_bonus = ATR_BAND_BONUS;
        }
    }

    let recent_tick_volume = inputs.recent_tick_volumes.last().copied().unwrap_or(0.0);
    if momentum_gates_pass(inputs.direction, inputs.m1, avg_tick_volume, recent_tick_volume) {
        breakdown.momentum_bonus = MOMENTUM_GATE_BONUS;
    }

    if let Some(micro_dir) = ma_direction(inputs.m15, 8, 21) {
        if micro_dir == inputs.direction {
            breakdown.micro_trend_bonus = MICRO_TREND_BONUS;
        }
    }

    breakdown.news_penalty = inputs.news_penalty;

    let summed = breakdown.base
        + breakdown.session_bonus
        + breakdown.volume_bonus
        + breakdown.spread_bonus
        + breakdown.alignment_bonus
        + breakdown.volatility_bonus
        + breakdown.momentum_bonus
        + breakdown.micro_trend_bonus
        - breakdown.news_penalty;

    let with_session_mult = if inputs.is_optimal_pair { summed * SESSION_OPTIMAL_MULTIPLIER } else { summed };

    let final_score = cap_score(with_session_mult);

    ConfluenceResult { final_score, tf_alignment, breakdown }
}

/// Scores above 95 are compressed logarithmically toward an asymptote
/// at 98, with a hard cap at 98 regardless.
fn cap_score(score: f64) -> f64 {
    if score <= SOFT_CAP {
        return score.max(0.0);
    }
    let excess = score - SOFT_CAP;
    let compressed = SOFT_CAP + (HARD_CAP - SOFT_CAP) * (1.0 - (-excess / 10.0).exp());
    compressed.min(HARD_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(n: usize, c: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle { open: c, high: c + 0.0001, low: c - 0.0001, close: c, volume: 10.0, bucket_start_ts: i as i64 * 60 })
            .collect()
    }

    #[test]
    fn cap_compresses_above_95() {
        assert!(cap_score(100.0) < HARD_CAP);
        assert!(cap_score(100.0) > SOFT_CAP);
        assert!(cap_score(200.0) < HARD_CAP);
    }

    #[test]
    fn scores_at_or_below_95_are_unchanged() {
        assert_eq!(cap_score(80.0), 80.0);
    }

    #[test]
    fn tight_spread_and_volume_add_bonuses() {
        let m1 = flat_bars(15, 1.0800);
        let m5 = flat_bars(15, 1.0800);
        let m15 = flat_bars(25, 1.0800);
        let inputs = ConfluenceInputs {
            direction: Direction::Buy,
            base_score: 70.0,
            session: Session::London,
            is_optimal_pair: false,
            pair_quality_bonus: 0.0,
            recent_tick_volumes: &[1200.0, 1300.0, 1100.0, 1250.0, 1400.0],
            spread_pips: 1.0,
            m1: &m1,
            m5: &m5,
            m15: &m15,
            news_penalty: 0.0,
        };
        let result = score(&inputs);
        assert_eq!(result.breakdown.volume_bonus, VOLUME_CONFIRM_BONUS);
        assert_eq!(result.breakdown.spread_bonus, TIGHT_SPREAD_BONUS);
    }

    #[test]
    fn news_penalty_reduces_final_score() {
        let m1 = flat_bars(15, 1.0800);
        let m5 = flat_bars(15, 1.0800);
        let m15 = flat_bars(25, 1.0800);
        let make = |penalty: f64| ConfluenceInputs {
            direction: Direction::Buy,
            base_score: 70.0,
            session: Session::London,
            is_optimal_pair: false,
            pair_quality_bonus: 0.0,
            recent_tick_volumes: &[1.0],
            spread_pips: 5.0,
            m1: &m1,
            m5: &m5,
            m15: &m15,
            news_penalty: penalty,
        };
        let without = score(&make(0.0)).final_score;
        let with = score(&make(10.0)).final_score;
        assert!(with < without);
    }
}
