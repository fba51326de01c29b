//! Fixtures shared by the engine's unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{Bar, Direction, InstrumentMeta, StrategySignal};
use risk::{RiskConfig, RiskSizer};
use strategy::{Aggregator, ScoringStrategy, StrategyScorer};

use crate::DecisionPipeline;

/// Always votes one way at full confidence.
pub struct Always(pub Direction);

impl ScoringStrategy for Always {
    fn name(&self) -> &str {
        "ALWAYS"
    }

    fn score(&self, _bars: &[Bar]) -> StrategySignal {
        StrategySignal::new("ALWAYS", 100.0, self.0)
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
}

/// Hourly bars from `t0` built from `(high, low, close)` triples.
pub fn bars(hlc: &[(f64, f64, f64)]) -> Vec<Bar> {
    hlc.iter()
        .enumerate()
        .map(|(i, &(high, low, close))| Bar {
            timestamp: t0() + Duration::hours(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        })
        .collect()
}

pub fn quiet_bar() -> (f64, f64, f64) {
    (1.1005, 1.0995, 1.1000)
}

pub fn pipeline_with(direction: Direction, risk: RiskConfig, instrument: InstrumentMeta) -> DecisionPipeline {
    DecisionPipeline::new(
        StrategyScorer::with_strategies(vec![Box::new(Always(direction))], 1),
        Aggregator::default(),
        RiskSizer::without_fx(risk),
        instrument,
        "USD",
        60.0,
    )
}

pub fn pipeline(direction: Direction) -> DecisionPipeline {
    pipeline_with(direction, RiskConfig::default(), InstrumentMeta::default())
}
