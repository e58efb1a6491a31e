//! News evaluator (§6 external collaborator; supplemented shape from
//! original source `news_intelligence_gate.py`): a three-tier gate that
//! BLOCKs the whole scan cycle near tier-1 events, REDUCEs scores near
//! tier-2 events, and is NORMAL otherwise.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsAction {
    Block,
    Reduce,
    Normal,
}

#[derive(Debug, Clone)]
pub struct NewsEvaluation {
    pub action: NewsAction,
    pub penalty: i32,
    pub reason: String,
    pub next_event: Option<String>,
    pub minutes_to_event: Option<i64>,
}

impl NewsEvaluation {
    pub fn normal() -> Self {
        NewsEvaluation { action: NewsAction::Normal, penalty: 0, reason: "no upcoming events".into(), next_event: None, minutes_to_event: None }
    }
}

/// A scheduled news event used by the default three-tier evaluator.
#[derive(Debug, Clone)]
pub struct NewsEvent {
    pub name: String,
    pub tier: u8,
    pub at: DateTime<Utc>,
}

pub const TIER1_BLOCK_WINDOW_MIN: i64 = 15;
pub const TIER2_REDUCE_WINDOW_MIN: i64 = 30;
pub const TIER2_REDUCE_PENALTY: i32 = 10;

/// The local callable named in §6. Swappable behind a trait so the
/// gating pipeline (§4.D step 3) has a real default collaborator
/// (`DefaultNewsEvaluator`) instead of only a test mock.
pub trait NewsEvaluator: Send + Sync {
    fn evaluate(&self, symbol: &str, now: DateTime<Utc>) -> NewsEvaluation;
}

pub struct DefaultNewsEvaluator {
    events: Vec<NewsEvent>,
}

impl DefaultNewsEvaluator {
    pub fn new(events: Vec<NewsEvent>) -> Self {
        DefaultNewsEvaluator { events }
    }
}

impl NewsEvaluator for DefaultNewsEvaluator {
    fn evaluate(&self, _symbol: &str, now: DateTime<Utc>) -> NewsEvaluation {
        let mut nearest: Option<(&NewsEvent, i64)> = None;
        for event in &self.events {
            let minutes = (event.at - now).num_minutes();
            if minutes < 0 {
                continue;
            }
            if nearest.map_or(true, |(_, m)| minutes < m) {
                nearest = Some((event, minutes));
            }
        }
        let Some((event, minutes)) = nearest else {
            return NewsEvaluation::normal();
        };

        if event.tier == 1 && minutes <= TIER1_BLOCK_WINDOW_MIN {
            return NewsEvaluation {
                action: NewsAction::Block,
                penalty: 0,
                reason: format!("tier-1 event '{}' in {}min", event.name, minutes),
                next_event: Some(event.name.clone()),
                minutes_to_event: Some(minutes),
            };
        }
        if event.tier >= 2 && minutes <= TIER2_REDUCE_WINDOW_MIN {
            return NewsEvaluation {
                action: NewsAction::Reduce,
                penalty: TIER2_REDUCE_PENALTY,
                reason: format!("tier-2 event '{}' in {}min", event.name, minutes),
                next_event: Some(event.name.clone()),
                minutes_to_event: Some(minutes),
            };
        }
        NewsEvaluation {
            action: NewsAction::Normal,
            penalty: 0,
            reason: "no imminent events".into(),
            next_event: Some(event.name.clone()),
            minutes_to_event: Some(minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator_with(tier: u8, minutes_away: i64, now: DateTime<Utc>) -> DefaultNewsEvaluator {
        DefaultNewsEvaluator::new(vec![NewsEvent {
            name: "NFP".into(),
            tier,
            at: now + chrono::Duration::minutes(minutes_away),
        }])
    }

    #[test]
    fn tier1_within_window_blocks() {
        let now = Utc::now();
        let eval = evaluator_with(1, 10, now).evaluate("EURUSD", now);
        assert_eq!(eval.action, NewsAction::Block);
    }

    #[test]
    fn tier2_within_window_reduces() {
        let now = Utc::now();
        let eval = evaluator_with(2, 20, now).evaluate("EURUSD", now);
        assert_eq!(eval.action, NewsAction::Reduce);
        assert_eq!(eval.penalty, TIER2_REDUCE_PENALTY);
    }

    #[test]
    fn distant_event_is_normal() {
        let now = Utc::now();
        let eval = evaluator_with(1, 120, now).evaluate("EURUSD", now);
        assert_eq!(eval.action, NewsAction::Normal);
    }
}
