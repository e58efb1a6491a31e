//! Signal Publisher (component F, §4.F): assembles the final `Signal`
//! record, emits it to the outbound bus with its topic prefix, and logs
//! to the truth/tracking JSONL sinks.
//!
//! Grounded on `models.rs::Signal`'s builder-style construction (teacher,
//! before removal); truth/tracking JSONL append-with-fsync is net new,
//! grounded in spec.md §4.F and §6.

mod sinks;

pub use sinks::{TrackingLogWriter, TruthLogWriter};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ConfidenceBreakdown, Session, Signal, SignalType, SymbolSpec};
use crate::scoring::ScoredCandidate;
use crate::shield::ShieldOutcome;
use crate::symbols::{normalize_price, price_plus_pips};

pub const SIGNAL_TOPIC: &str = "ELITE_GUARD_SIGNAL";
const BASE_XP_REWARD: f64 = 100.0;
const SIGNAL_LIFETIME_MINUTES: i64 = 60;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("signal lacks a confidence calculation breakdown")]
    MissingBreakdown,
}

/// Assembles the externally-observable [`Signal`] from a scored
/// candidate and the Shield's verdict. Refuses to build one lacking a
/// real confidence breakdown (§4.F) — a `ConfidenceBreakdown::default()`
/// with every field at zero is indistinguishable from "never computed"
/// and is rejected the same way.
pub fn assemble_signal(
    scored: &ScoredCandidate,
    shield: &ShieldOutcome,
    symbol_spec: &SymbolSpec,
    session: Session,
    now: DateTime<Utc>,
) -> Result<Signal, PublishError> {
    if is_empty_breakdown(&scored.breakdown) {
        return Err(PublishError::MissingBreakdown);
    }

    let entry_price = scored.signal.entry_price;
    let stop_loss = price_plus_pips(symbol_spec, entry_price, opposite(scored.signal.direction), scored.sl_pips);
    let take_profit = price_plus_pips(symbol_spec, entry_price, scored.signal.direction, scored.tp_pips);

    let (citadel_shielded, shield_score, xp_multiplier) = match shield {
        ShieldOutcome::Enhanced(e) => (true, e.shield_score, e.xp_multiplier),
        ShieldOutcome::PassThrough => (false, 0.0, 1.0),
        ShieldOutcome::Rejected(_) => unreachable!("rejected signals are never assembled"),
    };

    Ok(Signal {
        signal_id: Signal::new_id(&scored.signal.pair, now),
        pair: scored.signal.pair.clone(),
        direction: scored.signal.direction,
        pattern: scored.signal.pattern,
        signal_mode: scored.mode,
        signal_type: SignalType::from(scored.mode),
        entry_price: normalize_price(symbol_spec, entry_price),
        stop_loss,
        take_profit,
        stop_pips: scored.sl_pips,
        target_pips: scored.tp_pips,
        risk_reward: scored.risk_reward,
        session,
        expires_at: now + chrono::Duration::minutes(SIGNAL_LIFETIME_MINUTES),
        xp_reward: BASE_XP_REWARD * xp_multiplier,
        shield_score,
        citadel_shielded,
        ml_tier: scored.signal.final_score,
        created_at: now,
        confidence_breakdown: scored.breakdown.clone(),
    })
}

fn opposite(direction: crate::model::Direction) -> crate::model::Direction {
    match direction {
        crate::model::Direction::Buy => crate::model::Direction::Sell,
        crate::model::Direction::Sell => crate::model::Direction::Buy,
    }
}

fn is_empty_breakdown(b: &ConfidenceBreakdown) -> bool {
    b.base == 0.0
        && b.session_bonus == 0.0
        && b.volume_bonus == 0.0
        && b.spread_bonus == 0.0
        && b.alignment_bonus == 0.0
        && b.volatility_bonus == 0.0
        && b.momentum_bonus == 0.0
        && b.micro_trend_bonus == 0.0
}

/// Tracking-log metadata beyond the bare `Signal` (§4.F: "richer
/// metadata: ATR, session, volatility, would_fire/fired flags").
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingRecord<'a> {
    #[serde(flatten)]
    pub signal: &'a Signal,
    pub atr: Option<f64>,
    pub volatility_band: bool,
    pub would_fire: bool,
    pub fired: bool,
}

/// Serializes `signal` as `{SIGNAL_TOPIC} <json>` for the outbound bus.
pub fn wire_frame(signal: &Signal) -> anyhow::Result<String> {
    Ok(format!("{SIGNAL_TOPIC} {}", serde_json::to_string(signal)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceBreakdown, Direction, Pattern, PatternSignal, SignalMode, Timeframe};
    use crate::symbols::DEFAULT_SPEC;

    fn scored(breakdown: ConfidenceBreakdown) -> ScoredCandidate {
        let mut signal = PatternSignal::new(Pattern::OrderBlockBounce, Direction::Buy, "EURUSD", 1.0850, 80.0, Timeframe::M5);
        signal.final_score = 80.0;
        ScoredCandidate { signal, mode: SignalMode::Rapid, tp_pips: 15.0, sl_pips: 10.0, risk_reward: 1.5, breakdown }
    }

    #[test]
    fn missing_breakdown_is_rejected() {
        let result = assemble_signal(
            &scored(ConfidenceBreakdown::default()),
            &ShieldOutcome::PassThrough,
            &DEFAULT_SPEC,
            Session::London,
            Utc::now(),
        );
        assert!(matches!(result, Err(PublishError::MissingBreakdown)));
    }

    #[test]
    fn side_invariant_holds_for_buy() {
        let breakdown = ConfidenceBreakdown { base: 70.0, ..Default::default() };
        let signal = assemble_signal(
            &scored(breakdown),
            &ShieldOutcome::PassThrough,
            &DEFAULT_SPEC,
            Session::London,
            Utc::now(),
        )
        .unwrap();
        assert!(signal.stop_loss < signal.entry_price);
        assert!(signal.entry_price < signal.take_profit);
    }

    #[test]
    fn shield_enhancement_multiplies_xp_reward() {
        let breakdown = ConfidenceBreakdown { base: 70.0, ..Default::default() };
        let enhancement = crate::shield::ShieldEnhancement { shield_score: 85.0, xp_multiplier: 1.3 };
        let signal = assemble_signal(
            &scored(breakdown),
            &ShieldOutcome::Enhanced(enhancement),
            &DEFAULT_SPEC,
            Session::London,
            Utc::now(),
        )
        .unwrap();
        assert!(signal.citadel_shielded);
        assert!((signal.xp_reward - BASE_XP_REWARD * 1.3).abs() < 1e-9);
    }
}
