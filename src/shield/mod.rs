//! Shield Filter (component E, §4.E, "CITADEL"): a multi-source median
//! consensus predicate used to reject manipulated signals and boost
//! confidence on signals that clear consensus.
//!
//! Grounded on original source `citadel_shield_filter.py` (median/σ
//! consensus, outlier rejection, score enhancement table) combined with
//! `signals/quality.rs`'s corroboration-gated outlier style and
//! `route_quality/metrics.rs`'s TTL-cache-by-bucket idiom (teacher,
//! before removal). `ConsensusSource` is `async_trait` so swappable
//! implementations (real quote APIs, or a test double) both implement
//! the same dyn-compatible boundary named in §6.

mod cache;
mod sources;

pub use cache::ConsensusCache;
pub use sources::{ConsensusSource, HttpQuoteSource, SimulatedSource};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use statrs::statistics::{Data, Distribution, OrderStatistics};

use crate::error::ShieldRejection;

const MIN_SOURCES: usize = 3;
const OUTLIER_SIGMA: f64 = 2.0;
const MAX_OUTLIERS: usize = 1;
const MIN_CONFIDENCE: f64 = 75.0;
const MAX_DEVIATION_PCT: f64 = 0.5;
const MAX_CONSENSUS_AGE: Duration = Duration::from_secs(60);
const SCORE_CAP: f64 = 90.0;
const CONFIDENCE_BONUS_MAX: f64 = 8.0;
const SOURCE_COUNT_BONUS_MAX: f64 = 3.0;
const XP_MULTIPLIER: f64 = 1.3;

#[derive(Debug, Clone)]
pub struct Consensus {
    pub median_price: f64,
    pub confidence: f64,
    pub outlier_count: usize,
    pub source_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ShieldEnhancement {
    pub shield_score: f64,
    pub xp_multiplier: f64,
}

/// Outcome of evaluating one candidate signal through the Shield.
#[derive(Debug, Clone)]
pub enum ShieldOutcome {
    /// Fewer than 3 sources responded: pass through unenhanced,
    /// `citadel_shielded = false` (§4.E).
    PassThrough,
    Enhanced(ShieldEnhancement),
    Rejected(ShieldRejection),
}

pub struct ShieldFilter {
    sources: Vec<Arc<dyn ConsensusSource>>,
    cache: ConsensusCache,
    live_mode: bool,
}

impl ShieldFilter {
    /// `live_mode = true` refuses to construct if any configured source
    /// is a simulated/demo source (§4.E: "an attempt to fabricate quotes
    /// must fail loudly").
    pub fn new(sources: Vec<Arc<dyn ConsensusSource>>, live_mode: bool) -> anyhow::Result<Self> {
        if live_mode {
            if let Some(fake) = sources.iter().find(|s| s.is_simulated()) {
                anyhow::bail!("refusing to start in live mode with simulated source '{}'", fake.name());
            }
        }
        Ok(ShieldFilter { sources, cache: ConsensusCache::new(), live_mode })
    }

    pub fn is_live(&self) -> bool {
        self.live_mode
    }

    /// Builds consensus for `symbol` at `now`, consulting the 15s-bucket
    /// cache first, otherwise polling every configured source.
    pub async fn consensus(&self, symbol: &str, now: DateTime<Utc>) -> Option<Consensus> {
        if let Some(cached) = self.cache.get(symbol, now) {
            return Some(cached);
        }
        let mut prices = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if let Some(price) = source.quote(symbol).await {
                prices.push(price);
            }
        }
        if prices.len() < MIN_SOURCES {
            return None;
        }
        let consensus = build_consensus(&prices, now);
        self.cache.put(symbol, now, consensus.clone());
        Some(consensus)
    }

    /// Evaluates `entry_price` against consensus for `symbol` (§4.E /
    /// §8 "Shield reject").
    pub async fn evaluate(&self, symbol: &str, entry_price: f64, now: DateTime<Utc>) -> ShieldOutcome {
        let Some(consensus) = self.consensus(symbol, now).await else {
            return ShieldOutcome::PassThrough;
        };

        let age = now.signed_duration_since(consensus.timestamp).to_std().unwrap_or(Duration::MAX);
        if age > MAX_CONSENSUS_AGE {
            return ShieldOutcome::Rejected(ShieldRejection::StaleConsensus {
                age_secs: age.as_secs(),
                max_secs: MAX_CONSENSUS_AGE.as_secs(),
            });
        }
        if consensus.outlier_count > MAX_OUTLIERS {
            return ShieldOutcome::Rejected(ShieldRejection::TooManyOutliers {
                outliers: consensus.outlier_count,
                max: MAX_OUTLIERS,
            });
        }
        if consensus.confidence < MIN_CONFIDENCE {
            return ShieldOutcome::Rejected(ShieldRejection::LowConfidence {
                confidence: consensus.confidence,
                floor: MIN_CONFIDENCE,
            });
        }
        let deviation_pct = (entry_price - consensus.median_price).abs() / consensus.median_price * 100.0;
        if deviation_pct > MAX_DEVIATION_PCT {
            return ShieldOutcome::Rejected(ShieldRejection::PriceDeviation {
                deviation_pct,
                limit_pct: MAX_DEVIATION_PCT,
            });
        }

        let confidence_bonus = (consensus.confidence - MIN_CONFIDENCE) / (100.0 - MIN_CONFIDENCE) * CONFIDENCE_BONUS_MAX;
        let source_bonus = ((consensus.source_count as f64 - MIN_SOURCES as f64) * 1.0).clamp(0.0, SOURCE_COUNT_BONUS_MAX);
        let shield_score = (confidence_bonus.max(0.0) + source_bonus).min(SCORE_CAP);

        ShieldOutcome::Enhanced(ShieldEnhancement { shield_score, xp_multiplier: XP_MULTIPLIER })
    }
}

fn build_consensus(prices: &[f64], now: DateTime<Utc>) -> Consensus {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let data = Data::new(sorted.clone());
    let median = Data::new(sorted.clone()).median();
    let std_dev = data.std_dev().unwrap_or(0.0);

    let outlier_count = if std_dev > 0.0 {
        prices.iter().filter(|&&p| (p - median).abs() > OUTLIER_SIGMA * std_dev).count()
    } else {
        0
    };
    let confidence = (prices.len() - outlier_count) as f64 / prices.len() as f64 * 100.0;

    Consensus { median_price: median, confidence, outlier_count, source_count: prices.len(), timestamp: now }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_flags_outlier_beyond_two_sigma() {
        let prices = vec![1.0850, 1.0851, 1.0849, 1.0850, 1.1200];
        let consensus = build_consensus(&prices, Utc::now());
        assert!(consensus.outlier_count >= 1);
        assert!(consensus.confidence < 100.0);
    }

    #[test]
    fn clean_consensus_has_full_confidence() {
        let prices = vec![1.0850, 1.0851, 1.0849, 1.0850];
        let consensus = build_consensus(&prices, Utc::now());
        assert_eq!(consensus.outlier_count, 0);
        assert_eq!(consensus.confidence, 100.0);
    }

    fn sources_with(prices: &[f64]) -> Vec<Arc<dyn ConsensusSource>> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut q = std::collections::HashMap::new();
                q.insert("EURUSD".to_string(), p);
                Arc::new(SimulatedSource::new(format!("src{i}"), q)) as Arc<dyn ConsensusSource>
            })
            .collect()
    }

    #[test]
    fn live_mode_refuses_simulated_sources() {
        let sources = sources_with(&[1.0850, 1.0851, 1.0849]);
        assert!(ShieldFilter::new(sources, true).is_err());
    }

    #[tokio::test]
    async fn fewer_than_three_sources_passes_through() {
        let sources = sources_with(&[1.0850, 1.0851]);
        let filter = ShieldFilter::new(sources, false).unwrap();
        let outcome = filter.evaluate("EURUSD", 1.0850, Utc::now()).await;
        assert!(matches!(outcome, ShieldOutcome::PassThrough));
    }

    #[tokio::test]
    async fn accept_scenario_from_spec_section_8() {
        // 4 sources, median 1.08510, entry 1.08513 -> accept with enhancement.
        let sources = sources_with(&[1.08510, 1.08511, 1.08509, 1.08510]);
        let filter = ShieldFilter::new(sources, false).unwrap();
        let outcome = filter.evaluate("EURUSD", 1.08513, Utc::now()).await;
        match outcome {
            ShieldOutcome::Enhanced(e) => {
                assert!((e.xp_multiplier - XP_MULTIPLIER).abs() < 1e-9);
            }
            other => panic!("expected Enhanced, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn large_deviation_is_rejected() {
        let sources = sources_with(&[1.08510, 1.08511, 1.08509, 1.08510]);
        let filter = ShieldFilter::new(sources, false).unwrap();
        let outcome = filter.evaluate("EURUSD", 1.09000, Utc::now()).await;
        assert!(matches!(outcome, ShieldOutcome::Rejected(ShieldRejection::PriceDeviation { .. })));
    }
}
