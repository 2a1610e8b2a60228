//! Cost accounting for language-model usage
//!
//! Token counts reported by the model API are converted into USD through a
//! versioned, configuration-driven price table. Session state is an explicit
//! value handed to each call site - a server holding many sessions simply
//! holds many trackers - and counters are atomics updated with a single
//! increment per completed call, so concurrent queries never lose updates.

use crate::config::PricingConfig;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Versioned token prices.
///
/// Prices change over time; this table is built from configuration so a price
/// update is a config change, not a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    /// Identifier recorded with every session snapshot
    pub version: String,

    /// USD per 1000 prompt tokens
    pub prompt_usd_per_1k: f64,

    /// USD per 1000 completion tokens
    pub completion_usd_per_1k: f64,
}

impl PriceTable {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            version: config.version.clone(),
            prompt_usd_per_1k: config.prompt_usd_per_1k,
            completion_usd_per_1k: config.completion_usd_per_1k,
        }
    }

    /// Cost of a single call in USD
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.prompt_usd_per_1k
            + (completion_tokens as f64 / 1000.0) * self.completion_usd_per_1k
    }
}

/// Cumulative usage of one running session, reset at process start and never
/// persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySession {
    pub cumulative_prompt_tokens: u64,
    pub cumulative_completion_tokens: u64,
    pub cumulative_cost_usd: f64,
    pub price_version: String,
}

/// Session-scoped cost tracker.
///
/// Costs are accumulated as integer micro-USD so the session total equals the
/// exact sum of the per-call values handed back by `record`.
pub struct CostTracker {
    prices: PriceTable,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    cost_micro_usd: AtomicU64,
}

impl CostTracker {
    pub fn new(prices: PriceTable) -> Self {
        Self {
            prices,
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            cost_micro_usd: AtomicU64::new(0),
        }
    }

    /// Record a completed model call; returns the cost of this call in USD.
    ///
    /// Only successful calls should be recorded - a failed call that billed
    /// nothing consumes no budget. Whatever token counts the API reported are
    /// taken at face value.
    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let micro = (self.prices.cost(prompt_tokens, completion_tokens) * 1e6).round() as u64;

        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens, Ordering::Relaxed);
        self.cost_micro_usd.fetch_add(micro, Ordering::Relaxed);

        counter!("docqa_llm_prompt_tokens_total").increment(prompt_tokens);
        counter!("docqa_llm_completion_tokens_total").increment(completion_tokens);

        micro as f64 / 1e6
    }

    /// Cumulative cost of the session in USD
    pub fn session_total(&self) -> f64 {
        self.cost_micro_usd.load(Ordering::Relaxed) as f64 / 1e6
    }

    /// Snapshot of the running session
    pub fn snapshot(&self) -> QuerySession {
        QuerySession {
            cumulative_prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            cumulative_completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            cumulative_cost_usd: self.session_total(),
            price_version: self.prices.version.clone(),
        }
    }

    /// The price table this tracker bills against
    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn table() -> PriceTable {
        PriceTable {
            version: "test-v1".to_string(),
            prompt_usd_per_1k: 0.5,
            completion_usd_per_1k: 1.5,
        }
    }

    #[test]
    fn test_per_call_cost() {
        let prices = table();
        assert!((prices.cost(1000, 0) - 0.5).abs() < 1e-12);
        assert!((prices.cost(0, 2000) - 3.0).abs() < 1e-12);
        assert!((prices.cost(1000, 1000) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_session_total_is_sum_of_calls() {
        let tracker = CostTracker::new(table());
        let mut expected = 0.0;
        for (p, c) in [(100u64, 50u64), (200, 0), (0, 300), (1234, 567)] {
            expected += tracker.record(p, c);
        }
        assert!((tracker.session_total() - expected).abs() < 1e-12);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.cumulative_prompt_tokens, 1534);
        assert_eq!(snapshot.cumulative_completion_tokens, 917);
        assert_eq!(snapshot.price_version, "test-v1");
    }

    #[test]
    fn test_total_is_monotonic() {
        let tracker = CostTracker::new(table());
        let mut last = tracker.session_total();
        for _ in 0..10 {
            tracker.record(10, 10);
            let total = tracker.session_total();
            assert!(total >= last);
            last = total;
        }
    }

    #[test]
    fn test_no_lost_updates_under_concurrency() {
        let tracker = Arc::new(CostTracker::new(table()));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    tracker.record(10, 5);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.cumulative_prompt_tokens, 8 * 100 * 10);
        assert_eq!(snapshot.cumulative_completion_tokens, 8 * 100 * 5);
        let expected = tracker.prices().cost(8 * 100 * 10, 8 * 100 * 5);
        assert!((snapshot.cumulative_cost_usd - expected).abs() < 1e-6);
    }
}
