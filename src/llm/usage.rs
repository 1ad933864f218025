//! Running token counts and the approximate cost they represent.
//!
//! Prices are USD per million tokens. Cached input is not priced
//! separately. Nothing here influences whether a request succeeds.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

static PRICES: Lazy<HashMap<&'static str, ModelPrice>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4o-mini", ModelPrice { input: 0.15, output: 0.6 }),
        ("gpt-4o", ModelPrice { input: 2.5, output: 10.0 }),
        ("o1", ModelPrice { input: 15.0, output: 60.0 }),
        ("o1-mini", ModelPrice { input: 1.1, output: 4.4 }),
        ("o3-mini", ModelPrice { input: 1.1, output: 4.4 }),
        ("text-embedding-ada-002", ModelPrice { input: 0.10, output: 0.0 }),
        ("text-embedding-3-small", ModelPrice { input: 0.02, output: 0.0 }),
        ("text-embedding-3-large", ModelPrice { input: 0.13, output: 0.0 }),
    ])
});

/// Price of `model`, falling back to the longest known prefix so dated
/// snapshots such as `gpt-4o-mini-2024-07-18` are still priced.
pub fn price_for(model: &str) -> Option<ModelPrice> {
    if let Some(p) = PRICES.get(model) {
        return Some(*p);
    }
    PRICES
        .iter()
        .filter(|(name, _)| model.starts_with(*name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, p)| *p)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
}

impl TokenUsage {
    fn add(&mut self, other: TokenUsage) {
        self.prompt += other.prompt;
        self.completion += other.completion;
    }
}

/// Per-model accumulator.
///
/// The lock is only taken for the duration of a map update and never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct UsageTracker {
    used: Mutex<HashMap<String, TokenUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model: &str, usage: TokenUsage) {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.entry(model.to_string()).or_default().add(usage);
    }

    pub fn usage(&self, model: &str) -> TokenUsage {
        let used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.get(model).copied().unwrap_or_default()
    }

    /// Approximate total spend across every model seen so far.
    pub fn total_cost(&self) -> f64 {
        let used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        used.iter()
            .filter_map(|(model, u)| price_for(model).map(|p| (p, u)))
            .map(|(p, u)| {
                u.prompt as f64 / 1_000_000.0 * p.input
                    + u.completion as f64 / 1_000_000.0 * p.output
            })
            .sum()
    }
}
