//! Model pricing and session cost accounting.
//!
//! Prices are held as integer picodollars per token, which is numerically
//! the same as micro-USD per million tokens: a $3.00/M price is 3_000_000
//! picodollars per token. Per-request costs and session totals therefore
//! accumulate in exact integer arithmetic; floats appear only when a price
//! enters the table and when a cost is formatted for display.

use std::collections::HashMap;

use crate::core::config::PriceOverride;
use crate::core::session::SessionTotals;

/// Picodollars in one USD.
pub const PICO_PER_USD: u64 = 1_000_000_000_000;

/// Per-token pricing for a model, in picodollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceEntry {
    pub prompt_pico_per_token: u64,
    pub completion_pico_per_token: u64,
}

impl PriceEntry {
    /// Build an entry from USD-per-million-token prices, the unit pricing
    /// pages quote.
    pub fn per_million(prompt_usd: f64, completion_usd: f64) -> Self {
        Self {
            prompt_pico_per_token: (prompt_usd * 1_000_000.0).round() as u64,
            completion_pico_per_token: (completion_usd * 1_000_000.0).round() as u64,
        }
    }

    /// Exact cost of a request, in picodollars.
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> u64 {
        prompt_tokens * self.prompt_pico_per_token
            + completion_tokens * self.completion_pico_per_token
    }
}

/// Pricing table with built-in defaults and config-file overrides.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, PriceEntry>,
}

impl PricingTable {
    /// Table with built-in prices for common OpenRouter model identifiers.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        prices.insert(
            "anthropic/claude-sonnet-4".to_string(),
            PriceEntry::per_million(3.0, 15.0),
        );
        prices.insert(
            "anthropic/claude-opus-4".to_string(),
            PriceEntry::per_million(15.0, 75.0),
        );
        prices.insert(
            "anthropic/claude-3.5-haiku".to_string(),
            PriceEntry::per_million(0.8, 4.0),
        );
        prices.insert(
            "openai/gpt-4o".to_string(),
            PriceEntry::per_million(2.5, 10.0),
        );
        prices.insert(
            "openai/gpt-4o-mini".to_string(),
            PriceEntry::per_million(0.15, 0.6),
        );
        prices.insert(
            "openai/o3-mini".to_string(),
            PriceEntry::per_million(1.1, 4.4),
        );
        prices.insert(
            "google/gemini-2.0-flash".to_string(),
            PriceEntry::per_million(0.1, 0.4),
        );
        prices.insert(
            "google/gemini-1.5-pro".to_string(),
            PriceEntry::per_million(1.25, 5.0),
        );
        prices.insert(
            "meta-llama/llama-3.1-70b".to_string(),
            PriceEntry::per_million(0.52, 0.75),
        );
        prices.insert(
            "mistral/mistral-large".to_string(),
            PriceEntry::per_million(2.0, 6.0),
        );
        prices.insert(
            "deepseek/deepseek-v3".to_string(),
            PriceEntry::per_million(0.27, 1.1),
        );

        Self { prices }
    }

    /// An empty table (tests and fully custom configurations).
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Default table with the config file's `[[pricing]]` overrides applied.
    pub fn from_config(overrides: &[PriceOverride]) -> Self {
        let mut table = Self::with_defaults();
        for entry in overrides {
            table.set(
                entry.model.clone(),
                PriceEntry::per_million(entry.prompt_per_million, entry.completion_per_million),
            );
        }
        table
    }

    /// Add or replace pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, entry: PriceEntry) {
        self.prices.insert(model.into(), entry);
    }

    /// Look up pricing for a model: exact identifier first, then by the
    /// bare name with any provider prefix stripped ("openai/gpt-4o" and
    /// "gpt-4o" resolve to the same entry).
    pub fn get(&self, model: &str) -> Option<PriceEntry> {
        if let Some(entry) = self.prices.get(model) {
            return Some(*entry);
        }

        let bare = model.rsplit('/').next().unwrap_or(model);
        self.prices
            .iter()
            .find(|(key, _)| key.rsplit('/').next().unwrap_or(key.as_str()) == bare)
            .map(|(_, entry)| *entry)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The incremental cost attributed to a single request. `cost` is `None`
/// when the model had no price table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostDelta {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: Option<u64>,
}

/// Accumulates per-request usage into session totals. Pure accounting,
/// no I/O.
///
/// A price table miss is not an error here: the request is recorded with
/// an unknown cost (counted in `unknown_cost_requests`) and the session
/// continues. The session loop is responsible for warning the user.
#[derive(Debug)]
pub struct CostTracker {
    table: PricingTable,
    totals: SessionTotals,
}

impl CostTracker {
    pub fn new(table: PricingTable) -> Self {
        Self {
            table,
            totals: SessionTotals::default(),
        }
    }

    /// Record one request's usage and return its cost delta.
    pub fn record(&mut self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> CostDelta {
        let cost = self
            .table
            .get(model)
            .map(|entry| entry.cost(prompt_tokens, completion_tokens));

        self.totals.total_prompt_tokens += prompt_tokens;
        self.totals.total_completion_tokens += completion_tokens;
        self.totals.total_cost_picousd += cost.unwrap_or(0);
        self.totals.request_count += 1;
        if cost.is_none() {
            self.totals.unknown_cost_requests += 1;
        }

        CostDelta {
            prompt_tokens,
            completion_tokens,
            cost,
        }
    }

    pub fn totals(&self) -> &SessionTotals {
        &self.totals
    }
}

/// Format picodollars for display, with more precision for small amounts.
pub fn format_usd(picousd: u64) -> String {
    let usd = picousd as f64 / PICO_PER_USD as f64;
    if usd < 0.0001 {
        format!("${usd:.6}")
    } else if usd < 0.01 {
        format!("${usd:.4}")
    } else {
        format!("${usd:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_cost_is_exact() {
        // 1200 prompt + 200 completion at $3.00/$15.00 per million:
        // 1200*3_000_000 + 200*15_000_000 = 6_600_000_000 pico = $0.0066
        let table = PricingTable::with_defaults();
        let entry = table.get("anthropic/claude-sonnet-4").unwrap();
        assert_eq!(entry.cost(1200, 200), 6_600_000_000);
    }

    #[test]
    fn lookup_falls_back_to_bare_model_name() {
        let table = PricingTable::with_defaults();
        let prefixed = table.get("openai/gpt-4o-mini").unwrap();
        let bare = table.get("gpt-4o-mini").unwrap();
        assert_eq!(prefixed, bare);
    }

    #[test]
    fn unknown_model_has_no_entry() {
        let table = PricingTable::with_defaults();
        assert!(table.get("unknown/model-xyz").is_none());
    }

    #[test]
    fn config_overrides_replace_builtin_prices() {
        let overrides = vec![PriceOverride {
            model: "openai/gpt-4o".to_string(),
            prompt_per_million: 5.0,
            completion_per_million: 20.0,
        }];
        let table = PricingTable::from_config(&overrides);

        let entry = table.get("openai/gpt-4o").unwrap();
        assert_eq!(entry.cost(1_000_000, 0), 5 * PICO_PER_USD);
    }

    #[test]
    fn tracker_records_a_single_request() {
        let mut tracker = CostTracker::new(PricingTable::with_defaults());
        let delta = tracker.record("anthropic/claude-sonnet-4", 1200, 200);

        assert_eq!(delta.cost, Some(6_600_000_000));
        assert_eq!(format_usd(delta.cost.unwrap()), "$0.0066");

        let totals = tracker.totals();
        assert_eq!(totals.total_prompt_tokens, 1200);
        assert_eq!(totals.total_completion_tokens, 200);
        assert_eq!(totals.total_cost_picousd, 6_600_000_000);
        assert_eq!(totals.request_count, 1);
        assert_eq!(totals.unknown_cost_requests, 0);
    }

    #[test]
    fn accumulation_is_drift_free_over_many_turns() {
        let mut table = PricingTable::empty();
        table.set("local/model", PriceEntry::per_million(3.0, 15.0));
        let per_turn = table.get("local/model").unwrap().cost(1200, 200);

        let mut tracker = CostTracker::new(table);
        for _ in 0..1000 {
            tracker.record("local/model", 1200, 200);
        }

        let totals = tracker.totals();
        assert_eq!(totals.total_cost_picousd, per_turn * 1000);
        assert_eq!(totals.total_prompt_tokens, 1200 * 1000);
        assert_eq!(totals.total_completion_tokens, 200 * 1000);
        assert_eq!(totals.request_count, 1000);
    }

    #[test]
    fn unknown_model_degrades_to_unknown_cost_without_poisoning_later_turns() {
        let mut tracker = CostTracker::new(PricingTable::with_defaults());

        let unknown = tracker.record("unknown/model-xyz", 100, 50);
        assert_eq!(unknown.cost, None);

        let known = tracker.record("anthropic/claude-sonnet-4", 1200, 200);
        assert_eq!(known.cost, Some(6_600_000_000));

        let totals = tracker.totals();
        assert_eq!(totals.request_count, 2);
        assert_eq!(totals.unknown_cost_requests, 1);
        // Unknown-cost requests contribute zero, not garbage
        assert_eq!(totals.total_cost_picousd, 6_600_000_000);
        assert_eq!(totals.total_prompt_tokens, 1300);
    }

    #[test]
    fn format_usd_scales_precision_with_magnitude() {
        assert_eq!(format_usd(0), "$0.000000");
        assert_eq!(format_usd(66_000_000), "$0.000066");
        assert_eq!(format_usd(6_600_000_000), "$0.0066");
        assert_eq!(format_usd(1_230_000_000_000), "$1.23");
    }
}
