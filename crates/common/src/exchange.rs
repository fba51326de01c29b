use async_trait::async_trait;

use crate::{Bar, Fill, Order, Result};

/// Supplier of historical and recent OHLC bars.
///
/// Implementations must return bars in strictly increasing time order. A
/// short or empty series is a valid answer, not an error: callers apply their
/// own minimum-bar rules.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_bars(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Bar>>;
}

/// Abstraction over order submission.
///
/// `PaperGateway` implements this for simulation. A rejection comes back as
/// `Error::OrderRejected`; the core never retries, retry policy belongs to
/// the caller.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit an order and return the fill confirmation.
    async fn submit_order(&self, order: &Order) -> Result<Fill>;
}

/// Exchange-rate lookup used for currency-aware sizing.
///
/// `rate(from, to)` is the number of `to` units one unit of `from` buys, or
/// `None` when the provider has no quote for that pair.
pub trait FxRateProvider: Send + Sync {
    fn rate(&self, from: &str, to: &str) -> Option<f64>;
}
