pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, SizingFailure};
pub use exchange::{ExecutionGateway, FxRateProvider, MarketDataSource};
pub use types::*;
