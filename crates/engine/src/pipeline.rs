use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{
    AggregatedDecision, Bar, Error, ExecutionGateway, Fill, InstrumentMeta, MarketDataSource, Order,
    OrderSide, Result, SizingFailure, StrategySignal,
};
use risk::{RiskSizer, StopPolicy};
use strategy::indicators::atr;
use strategy::{Aggregator, StrategyScorer};

/// A sized, directional trade ready to be submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub direction: OrderSide,
    pub score: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    /// Strongest strategy voting with the decision.
    pub trigger: String,
}

/// Everything one evaluation produced, actionable or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    pub signals: BTreeMap<String, StrategySignal>,
    pub aggregated: AggregatedDecision,
    /// Set when the aggregated decision cleared the threshold and was sized.
    pub trade: Option<TradeDecision>,
    /// Set when the decision was actionable but could not be sized.
    pub sizing_failure: Option<SizingFailure>,
}

/// Scorer → aggregator → threshold → sizer, shared by live evaluation and the
/// backtest.
#[derive(Debug)]
pub struct DecisionPipeline {
    scorer: StrategyScorer,
    aggregator: Aggregator,
    sizer: RiskSizer,
    instrument: InstrumentMeta,
    account_currency: String,
    execution_threshold: f64,
}

impl DecisionPipeline {
    pub fn new(
        scorer: StrategyScorer,
        aggregator: Aggregator,
        sizer: RiskSizer,
        instrument: InstrumentMeta,
        account_currency: impl Into<String>,
        execution_threshold: f64,
    ) -> Self {
        Self {
            scorer,
            aggregator,
            sizer,
            instrument,
            account_currency: account_currency.into(),
            execution_threshold,
        }
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    pub fn instrument(&self) -> &InstrumentMeta {
        &self.instrument
    }

    /// Score the window ending at the last bar and, when the consensus clears
    /// the threshold, size a trade at that bar's close.
    pub fn evaluate(&self, bars: &[Bar], equity: f64) -> Decision {
        let signals = self.scorer.calculate_all(bars);
        let aggregated = self.aggregator.calculate_final_score(&signals);
        let mut decision = Decision { signals, aggregated, ..Decision::default() };

        if !aggregated.is_actionable(self.execution_threshold) {
            return decision;
        }
        let (Some(side), Some(last)) = (aggregated.direction.side(), bars.last()) else {
            return decision;
        };

        let entry = last.close;
        let atr_value = match self.sizer.config().stop_policy {
            StopPolicy::Atr => atr(bars, self.sizer.config().atr_period),
            StopPolicy::FixedPips => None,
        };
        let Some((stop_loss, take_profit)) = self.sizer.stops(entry, aggregated.direction, atr_value)
        else {
            return decision;
        };

        let trigger = decision
            .signals
            .values()
            .filter(|s| s.direction == aggregated.direction)
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|s| s.name.clone())
            .unwrap_or_default();

        match self.sizer.calculate_volume(
            equity,
            entry,
            stop_loss,
            &self.instrument,
            &self.account_currency,
        ) {
            Ok(volume) => {
                decision.trade = Some(TradeDecision {
                    direction: side,
                    score: aggregated.score,
                    entry,
                    stop_loss,
                    take_profit,
                    volume,
                    trigger,
                });
            }
            Err(failure) => {
                warn!(error = %failure, symbol = %self.instrument.symbol, "Position not sized");
                decision.sizing_failure = Some(failure);
            }
        }
        decision
    }

    /// Fetch bars, evaluate and submit the resulting order, if any.
    ///
    /// Returns `Ok(None)` when there is nothing to do (daily loss limit hit,
    /// no actionable decision). Collaborator failures are returned as-is and
    /// never retried.
    pub async fn execute(
        &self,
        source: &dyn MarketDataSource,
        gateway: &dyn ExecutionGateway,
        timeframe: &str,
        count: usize,
        equity: f64,
        daily_pnl: f64,
    ) -> Result<Option<Fill>> {
        if self.sizer.is_daily_loss_limit_reached(equity, daily_pnl) {
            warn!(daily_pnl, "Daily loss limit reached, not trading");
            return Ok(None);
        }

        let symbol = &self.instrument.symbol;
        let bars = source.get_bars(symbol, timeframe, count).await?;
        let decision = self.evaluate(&bars, equity);
        if let Some(failure) = decision.sizing_failure {
            return Err(Error::Sizing(failure));
        }
        let Some(trade) = decision.trade else {
            debug!(
                score = decision.aggregated.score,
                direction = %decision.aggregated.direction,
                "No actionable decision"
            );
            return Ok(None);
        };

        let order = Order::market(
            symbol.clone(),
            trade.direction,
            trade.volume,
            trade.entry,
            trade.stop_loss,
            trade.take_profit,
        );
        info!(
            symbol = %order.symbol,
            side = %order.side,
            volume = order.volume,
            score = trade.score,
            "Submitting order"
        );
        let fill = gateway.submit_order(&order).await?;
        info!(order_id = %fill.order_id, price = fill.fill_price, "Order filled");
        Ok(Some(fill))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
