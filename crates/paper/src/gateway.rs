use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{Error, ExecutionGateway, Fill, InstrumentMeta, Order, OrderSide, RejectionReason, Result};

/// `[paper]` settings for the simulated gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_balance: f64,
    pub leverage: f64,
    /// Slippage in basis points applied to every fill.
    pub slippage_bps: f64,
    /// Largest accepted `|reference - latest| / latest`.
    pub max_price_deviation: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            leverage: 30.0,
            slippage_bps: 1.0,
            max_price_deviation: 0.005,
        }
    }
}

/// Simulated execution gateway.
///
/// Fills at the latest known price with slippage. Each fill locks
/// `notional / leverage` of the balance; nothing is ever released because
/// paper fills are not closed.
pub struct PaperGateway {
    config: PaperConfig,
    /// Margin locked by fills so far.
    used_margin: Arc<RwLock<f64>>,
    fills: Arc<RwLock<Vec<Fill>>>,
    /// Latest known price per symbol, updated via `update_price`.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    contract_sizes: HashMap<String, f64>,
}

impl PaperGateway {
    pub fn new(config: PaperConfig) -> Self {
        info!(
            balance = config.initial_balance,
            leverage = config.leverage,
            slippage_bps = config.slippage_bps,
            "PaperGateway initialized"
        );
        Self {
            config,
            used_margin: Arc::new(RwLock::new(0.0)),
            fills: Arc::new(RwLock::new(Vec::new())),
            prices: Arc::new(RwLock::new(HashMap::new())),
            contract_sizes: HashMap::new(),
        }
    }

    /// Make an instrument tradeable.
    pub fn with_instrument(mut self, meta: &InstrumentMeta) -> Self {
        self.contract_sizes.insert(meta.symbol.clone(), meta.contract_size);
        self
    }

    pub async fn update_price(&self, symbol: &str, price: f64) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn free_margin(&self) -> f64 {
        self.config.initial_balance - *self.used_margin.read().await
    }

    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }

    fn reject(order: &Order, reason: RejectionReason) -> Error {
        warn!(symbol = %order.symbol, side = %order.side, %reason, "Paper order rejected");
        Error::OrderRejected { reason }
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        if !(order.volume.is_finite() && order.volume > 0.0) {
            return Err(Self::reject(order, RejectionReason::InvalidVolume));
        }
        let Some(&contract_size) = self.contract_sizes.get(&order.symbol) else {
            return Err(Self::reject(
                order,
                RejectionReason::Other(format!("unknown instrument {}", order.symbol)),
            ));
        };
        let latest = self.prices.read().await.get(&order.symbol).copied().ok_or_else(|| {
            Error::External(format!("PaperGateway has no price for '{}'", order.symbol))
        })?;

        let deviation = (order.reference_price - latest).abs() / latest;
        if deviation > self.config.max_price_deviation {
            return Err(Self::reject(order, RejectionReason::PriceDeviation));
        }

        // Buys pay more, sells receive less
        let slip = self.config.slippage_bps / 10_000.0;
        let fill_price = match order.side {
            OrderSide::Buy => latest * (1.0 + slip),
            OrderSide::Sell => latest * (1.0 - slip),
        };

        let margin = order.volume * contract_size * fill_price / self.config.leverage;
        let mut used = self.used_margin.write().await;
        if margin > self.config.initial_balance - *used {
            return Err(Self::reject(order, RejectionReason::InsufficientMargin));
        }
        *used += margin;
        drop(used);

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            latest,
            fill = fill_price,
            volume = order.volume,
            margin,
            "Paper fill simulated"
        );

        let fill = Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            fill_price,
            volume: order.volume,
            timestamp: Utc::now(),
        };
        self.fills.write().await.push(fill.clone());
        Ok(fill)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn gateway(config: PaperConfig) -> PaperGateway {
        let gw = PaperGateway::new(config).with_instrument(&InstrumentMeta::default());
        gw.update_price("EURUSD", 1.1000).await;
        gw
    }

    fn order(side: OrderSide, volume: f64, reference: f64) -> Order {
        Order::market("EURUSD", side, volume, reference, 1.0980, 1.1040)
    }

    #[tokio::test]
    async fn buy_fill_applies_positive_slippage() {
        let gw = gateway(PaperConfig { slippage_bps: 10.0, ..PaperConfig::default() }).await;
        let fill = gw.submit_order(&order(OrderSide::Buy, 0.1, 1.1)).await.unwrap();
        let expected = 1.1 * (1.0 + 10.0 / 10_000.0);
        assert!((fill.fill_price - expected).abs() < 1e-12);
        assert_eq!(gw.fills().await.len(), 1);
    }

    #[tokio::test]
    async fn sell_fill_applies_negative_slippage() {
        let gw = gateway(PaperConfig { slippage_bps: 10.0, ..PaperConfig::default() }).await;
        let fill = gw.submit_order(&order(OrderSide::Sell, 0.1, 1.1)).await.unwrap();
        let expected = 1.1 * (1.0 - 10.0 / 10_000.0);
        assert!((fill.fill_price - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn non_positive_volume_is_rejected() {
        let gw = gateway(PaperConfig::default()).await;
        for volume in [0.0, -1.0, f64::NAN] {
            let err = gw.submit_order(&order(OrderSide::Buy, volume, 1.1)).await.unwrap_err();
            assert!(matches!(err, Error::OrderRejected { reason: RejectionReason::InvalidVolume }));
        }
    }

    #[tokio::test]
    async fn stale_reference_price_is_rejected() {
        let gw = gateway(PaperConfig::default()).await;
        let err = gw.submit_order(&order(OrderSide::Buy, 0.1, 1.1100)).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected { reason: RejectionReason::PriceDeviation }));
    }

    #[tokio::test]
    async fn margin_is_consumed_until_exhausted() {
        let cfg = PaperConfig { initial_balance: 1_000.0, leverage: 100.0, slippage_bps: 0.0, ..PaperConfig::default() };
        let gw = gateway(cfg).await;

        // 0.5 lots * 100k * 1.1 / 100 = 550 margin
        gw.submit_order(&order(OrderSide::Buy, 0.5, 1.1)).await.unwrap();
        assert!((gw.free_margin().await - 450.0).abs() < 1e-9);

        let err = gw.submit_order(&order(OrderSide::Sell, 0.5, 1.1)).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected { reason: RejectionReason::InsufficientMargin }));
        assert_eq!(gw.fills().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_price_is_external_failure() {
        let gw = PaperGateway::new(PaperConfig::default()).with_instrument(&InstrumentMeta::default());
        let err = gw.submit_order(&order(OrderSide::Buy, 0.1, 1.1)).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
    }

    #[tokio::test]
    async fn unknown_instrument_is_rejected() {
        let gw = gateway(PaperConfig::default()).await;
        let o = Order::market("XAUUSD", OrderSide::Buy, 0.1, 2000.0, 1990.0, 2020.0);
        let err = gw.submit_order(&o).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected { reason: RejectionReason::Other(_) }));
    }
}
