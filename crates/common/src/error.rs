use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RejectionReason;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Insufficient data: need {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sizing failed: {0}")]
    Sizing(#[from] SizingFailure),

    #[error("External collaborator failed: {0}")]
    External(String),

    #[error("Order rejected: {reason}")]
    OrderRejected { reason: RejectionReason },

    #[error("A backtest is already running")]
    BacktestAlreadyRunning,

    #[error("Backtest cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Why a position could not be sized. A sizing failure means "do not open",
/// never a crash.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SizingFailure {
    #[error("stop distance {distance} is below one tick ({tick_size})")]
    StopTooClose { distance: f64, tick_size: f64 },

    #[error("no conversion rate from {from} to {to}")]
    NoConversionRate { from: String, to: String },

    #[error("invalid instrument metadata: {0}")]
    InvalidInstrument(String),

    #[error("equity must be positive, got {0}")]
    NonPositiveEquity(f64),

    #[error("sized volume {volume} is below the instrument minimum {min}")]
    BelowMinimumVolume { volume: f64, min: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
