//! Mode classification (§4.D step 4): RAPID vs SNIPER, independent of
//! the RAPID_ASSAULT/PRECISION_STRIKE presentation label (spec.md §9).

use crate::model::{Pattern, SignalMode};

const RAPID_MAX_TP_PIPS: f64 = 15.0;
const SNIPER_MIN_TP_PIPS: f64 = 30.0;
const SNIPER_REVERSAL_MIN_TP_PIPS: f64 = 15.0;
const MIN_CONFIDENCE: f64 = 70.0;

fn is_rapid_pattern(pattern: Pattern) -> bool {
    matches!(pattern, Pattern::MomentumBurst | Pattern::SessionOpenFade | Pattern::MicroBreakoutRetest)
}

/// Classifies a candidate signal, returning `None` if it meets neither
/// mode's confidence floor (both are 70, per §4.D).
pub fn classify(pattern: Pattern, tp_pips: f64, confidence: f64) -> Option<SignalMode> {
    if confidence < MIN_CONFIDENCE {
        return None;
    }
    if tp_pips < RAPID_MAX_TP_PIPS || is_rapid_pattern(pattern) {
        return Some(SignalMode::Rapid);
    }
    if tp_pips >= SNIPER_MIN_TP_PIPS
        || (pattern.is_reversal() && tp_pips >= SNIPER_REVERSAL_MIN_TP_PIPS)
    {
        return Some(SignalMode::Sniper);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tp_is_rapid() {
        assert_eq!(classify(Pattern::OrderBlockBounce, 10.0, 80.0), Some(SignalMode::Rapid));
    }

    #[test]
    fn momentum_burst_is_always_rapid() {
        assert_eq!(classify(Pattern::MomentumBurst, 40.0, 80.0), Some(SignalMode::Rapid));
    }

    #[test]
    fn large_tp_is_sniper() {
        assert_eq!(classify(Pattern::OrderBlockBounce, 35.0, 80.0), Some(SignalMode::Sniper));
    }

    #[test]
    fn reversal_with_moderate_tp_is_sniper() {
        assert_eq!(classify(Pattern::LiquiditySweepReversal, 18.0, 80.0), Some(SignalMode::Sniper));
    }

    #[test]
    fn below_confidence_floor_classifies_nothing() {
        assert_eq!(classify(Pattern::OrderBlockBounce, 35.0, 60.0), None);
    }
}
