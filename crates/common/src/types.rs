use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC candle. Series are ordered by strictly increasing `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// True when this bar's range overlaps `[bottom, top]`.
    pub fn touches(&self, bottom: f64, top: f64) -> bool {
        self.low <= top && self.high >= bottom
    }
}

/// Directional output of a strategy or of the aggregated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    #[default]
    Neutral,
}

impl Direction {
    /// The order side this direction trades, or `None` for `Neutral`.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Direction::Buy => Some(OrderSide::Buy),
            Direction::Sell => Some(OrderSide::Sell),
            Direction::Neutral => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for longs, -1 for shorts. Multiplies a price move into PnL.
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Score and direction produced by one scoring strategy for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub name: String,
    /// Confidence in `[0, 100]`.
    pub score: f64,
    pub direction: Direction,
}

impl StrategySignal {
    pub fn new(name: impl Into<String>, score: f64, direction: Direction) -> Self {
        Self {
            name: name.into(),
            score: score.clamp(0.0, 100.0),
            direction,
        }
    }

    pub fn neutral(name: impl Into<String>) -> Self {
        Self::new(name, 0.0, Direction::Neutral)
    }
}

/// Weighted consensus across all strategy signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregatedDecision {
    pub score: f64,
    pub direction: Direction,
}

impl AggregatedDecision {
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Whether this decision should open a position at `threshold`.
    pub fn is_actionable(&self, threshold: f64) -> bool {
        self.direction != Direction::Neutral && self.score >= threshold
    }
}

/// Contract metadata required for position sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub symbol: String,
    /// Smallest price increment.
    pub tick_size: f64,
    /// Units of the base asset per one lot.
    pub contract_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    /// Currency in which this instrument's PnL is denominated.
    pub profit_currency: String,
}

impl Default for InstrumentMeta {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".into(),
            tick_size: 0.00001,
            contract_size: 100_000.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
            profit_currency: "USD".into(),
        }
    }
}

/// A sized trade decision handed to the execution gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    /// Price the decision was made at; gateways may reject on deviation.
    pub reference_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Order {
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        volume: f64,
        reference_price: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            volume,
            reference_price,
            stop_loss,
            take_profit,
        }
    }
}

/// Confirmation of a filled order returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub fill_price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Structured reason an order was refused by the execution gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientMargin,
    PriceDeviation,
    InvalidVolume,
    Other(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::InsufficientMargin => write!(f, "insufficient margin"),
            RejectionReason::PriceDeviation => write!(f, "price deviation"),
            RejectionReason::InvalidVolume => write!(f, "invalid volume"),
            RejectionReason::Other(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn bar_colour() {
        assert!(bar(1.0, 2.0, 0.5, 1.5).is_bullish());
        assert!(bar(1.5, 2.0, 0.5, 1.0).is_bearish());
        let doji = bar(1.0, 2.0, 0.5, 1.0);
        assert!(!doji.is_bullish() && !doji.is_bearish());
    }

    #[test]
    fn bar_touches_is_inclusive() {
        let b = bar(10.0, 12.0, 9.0, 11.0);
        assert!(b.touches(12.0, 13.0));
        assert!(b.touches(8.0, 9.0));
        assert!(!b.touches(12.01, 13.0));
    }

    #[test]
    fn strategy_signal_clamps_score() {
        assert_eq!(StrategySignal::new("X", 140.0, Direction::Buy).score, 100.0);
        assert_eq!(StrategySignal::new("X", -3.0, Direction::Sell).score, 0.0);
    }

    #[test]
    fn neutral_decision_is_never_actionable() {
        let d = AggregatedDecision { score: 99.0, direction: Direction::Neutral };
        assert!(!d.is_actionable(10.0));
        let d = AggregatedDecision { score: 60.0, direction: Direction::Buy };
        assert!(d.is_actionable(60.0));
        assert!(!d.is_actionable(60.5));
    }

    #[test]
    fn direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::Sell).unwrap();
        assert_eq!(json, "\"SELL\"");
    }
}
