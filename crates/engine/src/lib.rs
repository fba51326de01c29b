pub mod pipeline;
pub mod runner;
pub mod simulator;

pub use pipeline::{Decision, DecisionPipeline, TradeDecision};
pub use runner::{BacktestHandle, BacktestRunner, LogSink, ResultSink};
pub use simulator::{
    BacktestConfig, BacktestObserver, BacktestResult, BacktestSimulator, ClosedTrade, ExitReason,
    NoopObserver, SimulatedPosition, TriggerStats, MIN_WARMUP_BARS,
};

#[cfg(test)]
mod testkit;
