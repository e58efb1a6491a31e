//! Session/pair quality table feeding the "session-optimal pair" bonus
//! (§4.D step 3, spec.md:124). Grounded on original source
//! `elite_guard_engine.py`'s `session_intelligence` dict: a per-session
//! optimal-pairs list plus a flat `quality_bonus`, halved and capped by
//! [`super::confluence::score`] before being added to the breakdown.

use crate::model::Session;

fn optimal_pairs(session: Session) -> &'static [&'static str] {
    match session {
        Session::London => &["EURUSD", "GBPUSD", "EURGBP", "USDCHF"],
        Session::Ny => &["EURUSD", "GBPUSD", "USDCAD"],
        Session::Overlap => &["EURUSD", "GBPUSD", "EURJPY", "GBPJPY"],
        Session::Asian => &["USDJPY", "AUDUSD", "NZDUSD"],
        Session::OffHours => &[],
    }
}

fn quality_bonus(session: Session) -> f64 {
    match session {
        Session::London => 18.0,
        Session::Ny => 15.0,
        Session::Overlap => 25.0,
        Session::Asian => 8.0,
        Session::OffHours => 0.0,
    }
}

/// Whether `symbol` is one of `session`'s optimal pairs, and the flat
/// quality bonus to pass through as `ScoringContext::pair_quality_bonus`
/// when it is (`0.0` otherwise).
pub fn pair_quality(session: Session, symbol: &str) -> (bool, f64) {
    let optimal = optimal_pairs(session).contains(&symbol);
    (optimal, if optimal { quality_bonus(session) } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eurusd_is_optimal_in_london() {
        let (optimal, bonus) = pair_quality(Session::London, "EURUSD");
        assert!(optimal);
        assert_eq!(bonus, 18.0);
    }

    #[test]
    fn eurusd_is_optimal_in_overlap_with_higher_bonus() {
        let (optimal, bonus) = pair_quality(Session::Overlap, "EURUSD");
        assert!(optimal);
        assert_eq!(bonus, 25.0);
    }

    #[test]
    fn usdchf_is_not_optimal_in_asian() {
        let (optimal, bonus) = pair_quality(Session::Asian, "USDCHF");
        assert!(!optimal);
        assert_eq!(bonus, 0.0);
    }

    #[test]
    fn off_hours_has_no_optimal_pairs() {
        let (optimal, bonus) = pair_quality(Session::OffHours, "EURUSD");
        assert!(!optimal);
        assert_eq!(bonus, 0.0);
    }
}
