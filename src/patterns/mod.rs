//! Pattern Detectors (component C, §4.C): five reversible patterns plus
//! three momentum patterns, each a pure function from a symbol's candle
//! rings to `Option<PatternSignal>`.
//!
//! Grounded on original source `elite_guard_engine.py`'s
//! `detect_liquidity_sweep_reversal` / `detect_order_block_bounce` /
//! `detect_fair_value_gap_fill` and `crypto_smc_patterns.py`'s
//! compression/breakout family; style (pure `Option`-returning, no
//! panics on missing data) from `signals/detector.rs` before removal.

mod fvg;
mod liquidity_sweep;
mod micro_breakout;
mod momentum_burst;
mod order_block;
mod session_fade;
mod sweep_return;
mod vcb;

pub use fvg::detect_fair_value_gap_fill;
pub use liquidity_sweep::detect_liquidity_sweep_reversal;
pub use micro_breakout::detect_micro_breakout_retest;
pub use momentum_burst::detect_momentum_burst;
pub use order_block::detect_order_block_bounce;
pub use session_fade::detect_session_open_fade;
pub use sweep_return::detect_sweep_and_return;
pub use vcb::detect_vcb_breakout;

use crate::model::{Candle, Session};

/// Read-only view handed to every detector: closed bars per timeframe
/// (with the currently-forming M1 appended, §4.B) plus the session the
/// latest bar falls in. Detectors never mutate this and never fabricate
/// bars that aren't present — insufficient data is always `None`, never
/// a panic (spec.md §9's "exceptions for control flow" redesign note).
#[derive(Debug, Clone, Copy)]
pub struct DetectorInput<'a> {
    pub pair: &'a str,
    pub m1: &'a [Candle],
    pub m5: &'a [Candle],
    pub m15: &'a [Candle],
    pub session: Session,
}

/// Average true range over the last `n` bars, approximated as the mean
/// absolute close-to-close move (the teacher/spec don't need a true
/// high-low-prevclose ATR; this matches `elite_guard_engine.py`'s own
/// simplified ATR helper).
pub(crate) fn atr(bars: &[Candle], n: usize) -> Option<f64> {
    if bars.len() < n + 1 {
        return None;
    }
    let tail = &bars[bars.len() - n - 1..];
    let moves: Vec<f64> = tail.windows(2).map(|w| (w[1].close - w[0].close).abs()).collect();
    if moves.is_empty() {
        return None;
    }
    Some(moves.iter().sum::<f64>() / moves.len() as f64)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Simple moving average of `close` over the last `n` bars, `None` if
/// there aren't enough.
pub(crate) fn sma_close(bars: &[Candle], n: usize) -> Option<f64> {
    if bars.len() < n {
        return None;
    }
    Some(mean(&bars[bars.len() - n..].iter().map(|c| c.close).collect::<Vec<_>>()))
}

/// Runs every detector against the same input (§4.C: "the scanner
/// offers every pattern family a look at each cycle"). Declaration
/// order here has no bearing on which candidate survives scoring.
pub fn run_all(input: DetectorInput, jitter: f64) -> Vec<crate::model::PatternSignal> {
    [
        detect_liquidity_sweep_reversal(input, jitter),
        detect_order_block_bounce(input, jitter),
        detect_fair_value_gap_fill(input, jitter),
        detect_vcb_breakout(input, jitter),
        detect_sweep_and_return(input, jitter),
        detect_momentum_burst(input, jitter),
        detect_session_open_fade(input, jitter),
        detect_micro_breakout_retest(input, jitter),
    ]
    .into_iter()
    .flatten()
    .collect()
}
