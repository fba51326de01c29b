use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::FxRateProvider;

/// Fixed FX quotes keyed by concatenated pair (`"EURUSD" = 1.08` means one
/// EUR buys 1.08 USD).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticFxRates {
    quotes: BTreeMap<String, f64>,
}

impl StaticFxRates {
    pub fn new(quotes: BTreeMap<String, f64>) -> Self {
        Self { quotes }
    }

    pub fn with_quote(mut self, pair: &str, rate: f64) -> Self {
        self.quotes.insert(pair.to_uppercase(), rate);
        self
    }
}

impl FxRateProvider for StaticFxRates {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        self.quotes
            .get(&format!("{from}{to}").to_uppercase())
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }
}
