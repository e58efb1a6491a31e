//! TP/SL optimization (§4.D step 5) — the authoritative source of exit
//! levels for a published signal, superseding whatever a detector
//! computed for itself.

use crate::model::{Pattern, Session, SignalMode};

/// Fixed `(tp_pips, sl_pips)` table keyed by `(pattern_family, symbol)`
/// (spec.md:135), each family carrying a `DEFAULT` row plus any explicit
/// per-symbol overrides — same `DEFAULT` fallback idiom as
/// [`crate::config::SymbolTable::get`]. JPY crosses and GBPUSD's wider
/// typical ranges get their own rows; everything else rides `DEFAULT`.
fn base_targets(pattern: Pattern, symbol: &str) -> (f64, f64) {
    let rows: &[(&str, f64, f64)] = match pattern {
        Pattern::LiquiditySweepReversal => &[
            ("DEFAULT", 12.0, 8.0),
            ("GBPUSD", 14.0, 9.0),
            ("USDJPY", 10.0, 7.0),
        ],
        Pattern::OrderBlockBounce => &[
            ("DEFAULT", 15.0, 10.0),
            ("GBPUSD", 17.0, 11.0),
            ("USDJPY", 13.0, 9.0),
        ],
        Pattern::FairValueGapFill => &[("DEFAULT", 10.0, 7.0)],
        Pattern::VcbBreakout => &[("DEFAULT", 18.0, 9.0), ("GBPUSD", 20.0, 10.0)],
        Pattern::SweepAndReturn => &[("DEFAULT", 14.0, 8.0), ("USDJPY", 12.0, 7.0)],
        Pattern::MomentumBurst => &[("DEFAULT", 8.0, 5.0)],
        Pattern::SessionOpenFade => &[("DEFAULT", 6.0, 5.0)],
        Pattern::MicroBreakoutRetest => &[("DEFAULT", 4.5, 3.0)],
    };
    rows.iter()
        .find(|(row_symbol, ..)| *row_symbol == symbol)
        .or_else(|| rows.iter().find(|(row_symbol, ..)| *row_symbol == "DEFAULT"))
        .map(|(_, tp, sl)| (*tp, *sl))
        .unwrap_or((10.0, 7.0))
}

#[derive(Debug, Clone, Copy)]
pub struct OptimizedTargets {
    pub tp_pips: f64,
    pub sl_pips: f64,
}

/// Computes the authoritative TP/SL for `(pattern, symbol, mode)`,
/// applying the session multiplier and, for SNIPER signals, raising TP
/// to satisfy `min_rr` if the base table would otherwise fall short.
pub fn get_optimized_targets(
    pattern: Pattern,
    symbol: &str,
    mode: SignalMode,
    session: Session,
    min_rr: f64,
) -> OptimizedTargets {
    let (mut tp, sl) = base_targets(pattern, symbol);
    tp *= session.session_multiplier();

    if mode == SignalMode::Sniper && sl > 0.0 && tp / sl < min_rr {
        tp = sl * min_rr;
    }

    tracing::debug!(
        pattern = pattern.name(),
        ?mode,
        ?session,
        tp_pips = tp,
        sl_pips = sl,
        "computed optimized targets"
    );

    OptimizedTargets { tp_pips: tp, sl_pips: sl }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_session_scales_tp_up() {
        let base = get_optimized_targets(
            Pattern::LiquiditySweepReversal,
            "EURUSD",
            SignalMode::Rapid,
            Session::London,
            2.0,
        );
        let overlap = get_optimized_targets(
            Pattern::LiquiditySweepReversal,
            "EURUSD",
            SignalMode::Rapid,
            Session::Overlap,
            2.0,
        );
        assert!((overlap.tp_pips - base.tp_pips * 1.2).abs() < 1e-9);
    }

    #[test]
    fn session_adjustment_is_not_commutative_across_fresh_bases() {
        let overlap = get_optimized_targets(
            Pattern::OrderBlockBounce,
            "EURUSD",
            SignalMode::Rapid,
            Session::Overlap,
            2.0,
        );
        let asian = get_optimized_targets(
            Pattern::OrderBlockBounce,
            "EURUSD",
            SignalMode::Rapid,
            Session::Asian,
            2.0,
        );
        let (base_tp, _) = base_targets(Pattern::OrderBlockBounce, "EURUSD");
        assert!((overlap.tp_pips - base_tp * 1.2).abs() < 1e-9);
        assert!((asian.tp_pips - base_tp * 0.8).abs() < 1e-9);
    }

    #[test]
    fn symbol_override_wins_over_default_row() {
        let gbp = get_optimized_targets(
            Pattern::LiquiditySweepReversal,
            "GBPUSD",
            SignalMode::Rapid,
            Session::London,
            2.0,
        );
        let eur = get_optimized_targets(
            Pattern::LiquiditySweepReversal,
            "EURUSD",
            SignalMode::Rapid,
            Session::London,
            2.0,
        );
        assert!((gbp.tp_pips - 14.0).abs() < 1e-9);
        assert!((eur.tp_pips - 12.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_symbol_falls_back_to_default_row() {
        let targets = get_optimized_targets(
            Pattern::LiquiditySweepReversal,
            "AUDUSD",
            SignalMode::Rapid,
            Session::London,
            2.0,
        );
        assert!((targets.tp_pips - 12.0).abs() < 1e-9);
    }

    #[test]
    fn sniper_mode_raises_tp_to_meet_min_rr() {
        // MicroBreakoutRetest base is (4.5, 3.0) -> rr 1.5, below a 2.0 floor.
        let targets = get_optimized_targets(
            Pattern::MicroBreakoutRetest,
            "EURUSD",
            SignalMode::Sniper,
            Session::London,
            2.0,
        );
        assert!((targets.tp_pips - targets.sl_pips * 2.0).abs() < 1e-9);
    }
}
