//! Bar-level scoring strategies and their weighted aggregation.

pub mod aggregator;
pub mod config;
pub mod indicators;
pub mod scorer;
pub mod strategies;

pub use aggregator::Aggregator;
pub use config::ScoringConfig;
pub use scorer::StrategyScorer;
pub use strategies::ScoringStrategy;
