//! Scoring & Gating (component D, §4.D): the seven-step pipeline that
//! turns a detector's transient `PatternSignal` into either a rejection
//! or a fully-scored candidate ready for the Shield filter (§4.E).
//!
//! Net new relative to the teacher (no scoring pipeline exists in the
//! source crate); the statistics helpers (mean/ATR) follow
//! `signals/quality.rs`'s Welford `RollingStats` style before removal.

pub mod chop;
pub mod confluence;
pub mod cooldown;
pub mod disabled_combos;
pub mod mode;
pub mod news;
pub mod session_intel;
pub mod targets;

use crate::error::ScoreRejection;
use crate::model::{Candle, PatternSignal, Session};

pub use cooldown::CooldownTracker;
pub use disabled_combos::ComboWinRateTracker;
pub use news::{DefaultNewsEvaluator, NewsAction, NewsEvaluation, NewsEvaluator, NewsEvent};

/// Default ML tier gate threshold (§4.D step 2); the sole publication
/// gate here — auto-fire uses an independent, higher threshold
/// enforced downstream (outside this crate's scope per §1).
pub const DEFAULT_GROUP_THRESHOLD: f64 = 70.0;
/// Tier-1 patterns per §4.D step 6's hourly sliding-window quota.
const TIER1_PATTERNS: &[crate::model::Pattern] =
    &[crate::model::Pattern::LiquiditySweepReversal, crate::model::Pattern::OrderBlockBounce];

/// Whether `pattern` counts against the hourly tier-1 quota; exposed so
/// callers record a publication with the same classification
/// [`evaluate_candidate`] used to check it.
pub fn is_tier1(pattern: crate::model::Pattern) -> bool {
    TIER1_PATTERNS.contains(&pattern)
}

pub struct ScoringContext<'a> {
    pub symbol: &'a str,
    pub session: Session,
    pub spread_pips: f64,
    pub recent_tick_volumes: &'a [f64],
    pub m1: &'a [Candle],
    pub m5: &'a [Candle],
    pub m15: &'a [Candle],
    pub is_optimal_pair: bool,
    pub pair_quality_bonus: f64,
    pub news: NewsEvaluation,
    pub group_threshold: f64,
    pub min_rr: f64,
    pub now: chrono::DateTime<chrono::Utc>,
}

/// A signal that has survived every gate in §4.D, with its authoritative
/// TP/SL, mode and tf_alignment attached. Not yet a published [`crate::model::Signal`]
/// — that assembly step (§4.F) still needs the Shield filter's say.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub signal: PatternSignal,
    pub mode: crate::model::SignalMode,
    pub tp_pips: f64,
    pub sl_pips: f64,
    pub risk_reward: f64,
    pub breakdown: crate::model::ConfidenceBreakdown,
}

/// Runs steps 2-7 of §4.D against one candidate (step 1, the chop
/// filter, is checked once per symbol per cycle by the caller before
/// detectors even run, since it gates the whole symbol not one pattern).
#[allow(clippy::too_many_arguments)]
pub fn evaluate_candidate(
    mut candidate: PatternSignal,
    ctx: &ScoringContext,
    combos: &ComboWinRateTracker,
    cooldown: &CooldownTracker,
) -> Result<ScoredCandidate, ScoreRejection> {
    if ctx.news.action == NewsAction::Block {
        return Err(ScoreRejection::NewsBlock { reason: ctx.news.reason.clone() });
    }

    if candidate.final_score < ctx.group_threshold {
        return Err(ScoreRejection::BelowThreshold { score: candidate.final_score, threshold: ctx.group_threshold });
    }

    if combos.is_disabled(ctx.symbol, candidate.pattern, ctx.session) {
        return Err(ScoreRejection::DisabledCombo {
            symbol: ctx.symbol.to_string(),
            pattern: candidate.pattern.name().to_string(),
            session: format!("{:?}", ctx.session),
        });
    }

    let news_penalty = if ctx.news.action == NewsAction::Reduce { ctx.news.penalty as f64 } else { 0.0 };
    let confluence_result = confluence::score(&confluence::ConfluenceInputs {
        direction: candidate.direction,
        base_score: candidate.final_score,
        session: ctx.session,
        is_optimal_pair: ctx.is_optimal_pair,
        pair_quality_bonus: ctx.pair_quality_bonus,
        recent_tick_volumes: ctx.recent_tick_volumes,
        spread_pips: ctx.spread_pips,
        m1: ctx.m1,
        m5: ctx.m5,
        m15: ctx.m15,
        news_penalty,
    });
    candidate.final_score = confluence_result.final_score;
    candidate.tf_alignment = confluence_result.tf_alignment;

    // Provisional TP in pips (from the detector, where present) drives
    // mode classification; the authoritative value comes from
    // `targets::get_optimized_targets` right after.
    let provisional_tp = candidate.tp_pips.unwrap_or(10.0);
    let mode = mode::classify(candidate.pattern, provisional_tp, candidate.final_score)
        .ok_or(ScoreRejection::BelowThreshold { score: candidate.final_score, threshold: ctx.group_threshold })?;

    let optimized = targets::get_optimized_targets(candidate.pattern, ctx.symbol, mode, ctx.session, ctx.min_rr);
    let risk_reward = if optimized.sl_pips > 0.0 { optimized.tp_pips / optimized.sl_pips } else { 0.0 };

    if candidate.pattern.is_reversal() && risk_reward < 0.8 {
        return Err(ScoreRejection::RrFloor { rr: risk_reward, floor: 0.8 });
    }

    let tier1 = is_tier1(candidate.pattern);
    cooldown.check(ctx.symbol, tier1, ctx.now)?;

    candidate.sl_pips = Some(optimized.sl_pips);
    candidate.tp_pips = Some(optimized.tp_pips);

    Ok(ScoredCandidate { signal: candidate, mode, tp_pips: optimized.tp_pips, sl_pips: optimized.sl_pips, risk_reward, breakdown: confluence_result.breakdown })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Pattern, Timeframe};

    fn candidate(score: f64) -> PatternSignal {
        PatternSignal::new(Pattern::LiquiditySweepReversal, Direction::Buy, "EURUSD", 1.0850, score, Timeframe::M1)
    }

    fn base_ctx(now: chrono::DateTime<chrono::Utc>) -> ScoringContext<'static> {
        ScoringContext {
            symbol: "EURUSD",
            session: Session::London,
            spread_pips: 1.0,
            recent_tick_volumes: &[],
            m1: &[],
            m5: &[],
            m15: &[],
            is_optimal_pair: false,
            pair_quality_bonus: 0.0,
            news: NewsEvaluation::normal(),
            group_threshold: DEFAULT_GROUP_THRESHOLD,
            min_rr: 2.0,
            now,
        }
    }

    #[test]
    fn below_threshold_is_rejected() {
        let combos = ComboWinRateTracker::new();
        let now = chrono::Utc::now();
        let cooldown = CooldownTracker::new(300, 200, 20, now);
        let result = evaluate_candidate(candidate(50.0), &base_ctx(now), &combos, &cooldown);
        assert!(matches!(result, Err(ScoreRejection::BelowThreshold { .. })));
    }

    #[test]
    fn passing_candidate_gets_optimized_targets_and_mode() {
        let combos = ComboWinRateTracker::new();
        let now = chrono::Utc::now();
        let cooldown = CooldownTracker::new(300, 200, 20, now);
        let result = evaluate_candidate(candidate(85.0), &base_ctx(now), &combos, &cooldown).unwrap();
        assert!(result.risk_reward > 0.0);
        assert!(result.sl_pips > 0.0);
    }

    #[test]
    fn news_block_rejects_before_anything_else() {
        let combos = ComboWinRateTracker::new();
        let now = chrono::Utc::now();
        let cooldown = CooldownTracker::new(300, 200, 20, now);
        let mut ctx = base_ctx(now);
        ctx.news = NewsEvaluation {
            action: NewsAction::Block,
            penalty: 0,
            reason: "tier-1 event imminent".into(),
            next_event: None,
            minutes_to_event: None,
        };
        let result = evaluate_candidate(candidate(95.0), &ctx, &combos, &cooldown);
        assert!(matches!(result, Err(ScoreRejection::NewsBlock { .. })));
    }
}
