use std::collections::BTreeMap;

use tracing::{debug, warn};

use common::{AggregatedDecision, Direction, Error, Result, StrategySignal};

use crate::config::ScoringConfig;

#[derive(Debug, Clone, PartialEq)]
enum Weights {
    /// No weight map configured: every strategy counts 1.0.
    Uniform,
    /// Normalised to sum to 1. Names not present contribute nothing. When
    /// every weight is zero nothing contributes and the result is neutral.
    Explicit(BTreeMap<String, f64>),
}

/// Combines per-strategy signals into a single weighted decision.
///
/// Buy and sell signals are averaged separately by weight; the side with the
/// higher average wins by the margin between the two.
#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: Weights,
}

impl Aggregator {
    pub fn new(weights: &BTreeMap<String, f64>) -> Result<Self> {
        if let Some((name, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(Error::Config(format!("weight for {name} must be non-negative, got {w}")));
        }
        if weights.is_empty() {
            return Ok(Self { weights: Weights::Uniform });
        }

        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            warn!(strategies = weights.len(), "Weights sum to zero, every decision will be neutral");
            return Ok(Self { weights: Weights::Explicit(weights.clone()) });
        }

        let normalised = weights
            .iter()
            .map(|(name, w)| (name.clone(), w / total))
            .collect();
        Ok(Self { weights: Weights::Explicit(normalised) })
    }

    pub fn from_config(cfg: &ScoringConfig) -> Result<Self> {
        Self::new(&cfg.weights)
    }

    /// Effective weight for `name`, or `None` when it is excluded.
    pub fn weight_of(&self, name: &str) -> Option<f64> {
        match &self.weights {
            Weights::Uniform => Some(1.0),
            Weights::Explicit(map) => map.get(name).copied(),
        }
    }

    pub fn calculate_final_score(
        &self,
        signals: &BTreeMap<String, StrategySignal>,
    ) -> AggregatedDecision {
        let (mut buy_sum, mut buy_weight) = (0.0, 0.0);
        let (mut sell_sum, mut sell_weight) = (0.0, 0.0);

        for (name, signal) in signals {
            let Some(weight) = self.weight_of(name) else {
                debug!(strategy = %name, "No weight configured, ignoring");
                continue;
            };
            match signal.direction {
                Direction::Buy => {
                    buy_sum += signal.score * weight;
                    buy_weight += weight;
                }
                Direction::Sell => {
                    sell_sum += signal.score * weight;
                    sell_weight += weight;
                }
                Direction::Neutral => {}
            }
        }

        let avg = |sum: f64, weight: f64| if weight > 0.0 { sum / weight } else { 0.0 };
        let buy = avg(buy_sum, buy_weight);
        let sell = avg(sell_sum, sell_weight);

        let decision = if buy > sell {
            AggregatedDecision { score: (buy - sell).clamp(0.0, 100.0), direction: Direction::Buy }
        } else if sell > buy {
            AggregatedDecision { score: (sell - buy).clamp(0.0, 100.0), direction: Direction::Sell }
        } else {
            AggregatedDecision::neutral()
        };
        debug!(buy, sell, score = decision.score, direction = %decision.direction, "Aggregated");
        decision
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self { weights: Weights::Uniform }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
