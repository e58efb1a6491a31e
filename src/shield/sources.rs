//! Consensus quote sources (§4.E/§6): `async_trait` boundary so the
//! filter can be tested with fakes without live broker APIs, per
//! spec.md §1's "shield/consensus filtering ... modeled as a
//! pass-through predicate so the core remains testable".

use async_trait::async_trait;

#[async_trait]
pub trait ConsensusSource: Send + Sync {
    fn name(&self) -> &str;

    /// Current mid quote for `symbol`, or `None` if this source has
    /// nothing for it (never an error — a source timing out or lacking
    /// coverage for a symbol is routine, not exceptional).
    async fn quote(&self, symbol: &str) -> Option<f64>;

    /// Simulated/demo sources must say so, so [`super::ShieldFilter::new`]
    /// can refuse to start with one in live mode (§4.E).
    fn is_simulated(&self) -> bool {
        false
    }
}

/// An HTTP quote source backed by a simple `GET {base_url}/{symbol}`
/// JSON endpoint returning `{"mid": <price>}`. The simplest real
/// implementation of the trait; concrete broker/price-feed wiring is
/// external to this crate (§1).
pub struct HttpQuoteSource {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpQuoteSource {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        HttpQuoteSource { name: name.into(), base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ConsensusSource for HttpQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, symbol: &str) -> Option<f64> {
        #[derive(serde::Deserialize)]
        struct QuoteResponse {
            mid: f64,
        }
        let url = format!("{}/{}", self.base_url, symbol);
        let resp = self.client.get(&url).send().await.ok()?;
        let parsed: QuoteResponse = resp.json().await.ok()?;
        Some(parsed.mid)
    }
}

/// A fixed/fake quote source for tests and local demos. Always reports
/// `is_simulated() == true` so [`super::ShieldFilter::new`] refuses it
/// in live mode.
pub struct SimulatedSource {
    name: String,
    fixed_quotes: std::collections::HashMap<String, f64>,
}

impl SimulatedSource {
    pub fn new(name: impl Into<String>, fixed_quotes: std::collections::HashMap<String, f64>) -> Self {
        SimulatedSource { name: name.into(), fixed_quotes }
    }
}

#[async_trait]
impl ConsensusSource for SimulatedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, symbol: &str) -> Option<f64> {
        self.fixed_quotes.get(symbol).copied()
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_source_returns_fixed_quote() {
        let mut quotes = std::collections::HashMap::new();
        quotes.insert("EURUSD".to_string(), 1.0850);
        let source = SimulatedSource::new("demo", quotes);
        assert_eq!(source.quote("EURUSD").await, Some(1.0850));
        assert!(source.is_simulated());
    }
}
