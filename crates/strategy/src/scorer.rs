use std::collections::BTreeMap;

use tracing::debug;

use common::{Bar, StrategySignal};

use crate::config::ScoringConfig;
use crate::strategies::{
    MeanReversionStrategy, ScoringStrategy, SessionBreakoutStrategy, SmcBreakStrategy,
    TrendStrategy, VolatilityBreakoutStrategy,
};

/// Runs every registered scoring strategy over the same bar window.
pub struct StrategyScorer {
    strategies: Vec<Box<dyn ScoringStrategy>>,
    min_bars: usize,
}

impl StrategyScorer {
    pub const DEFAULT_MIN_BARS: usize = 50;

    /// Scorer with the five built-in strategies.
    pub fn new(min_bars: usize) -> Self {
        Self::with_strategies(
            vec![
                Box::new(TrendStrategy::default()),
                Box::new(MeanReversionStrategy::default()),
                Box::new(SmcBreakStrategy),
                Box::new(VolatilityBreakoutStrategy::default()),
                Box::new(SessionBreakoutStrategy::default()),
            ],
            min_bars,
        )
    }

    pub fn from_config(cfg: &ScoringConfig) -> Self {
        Self::new(cfg.min_bars)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ScoringStrategy>>, min_bars: usize) -> Self {
        Self { strategies, min_bars }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.name())
    }

    pub fn min_bars(&self) -> usize {
        self.min_bars
    }

    /// One signal per strategy, keyed by strategy name. Empty when fewer than
    /// `min_bars` bars are supplied.
    pub fn calculate_all(&self, bars: &[Bar]) -> BTreeMap<String, StrategySignal> {
        if bars.len() < self.min_bars {
            debug!(bars = bars.len(), required = self.min_bars, "Not enough bars to score");
            return BTreeMap::new();
        }
        self.strategies
            .iter()
            .map(|s| {
                let signal = s.score(bars);
                debug!(strategy = s.name(), score = signal.score, direction = %signal.direction, "Scored");
                (s.name().to_string(), signal)
            })
            .collect()
    }
}

impl std::fmt::Debug for StrategyScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyScorer")
            .field("strategies", &self.names().collect::<Vec<_>>())
            .field("min_bars", &self.min_bars)
            .finish()
    }
}

impl Default for StrategyScorer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_BARS)
    }
}
