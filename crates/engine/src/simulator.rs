use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Bar, Error, OrderSide, Result};

use crate::pipeline::DecisionPipeline;

/// Fewest bars consumed before the first evaluation.
pub const MIN_WARMUP_BARS: usize = 200;

/// `[backtest]` section of the engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Inclusive lower bound, RFC 3339 or `YYYY-MM-DD`.
    pub start: Option<String>,
    /// Inclusive upper bound, RFC 3339 or `YYYY-MM-DD` (whole day).
    pub end: Option<String>,
    /// Bars consumed before the first evaluation, at least `MIN_WARMUP_BARS`.
    pub warmup_bars: usize,
    /// Trailing window handed to the scorer at each step.
    pub lookback: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            start: None,
            end: None,
            warmup_bars: MIN_WARMUP_BARS,
            lookback: 500,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(Error::Config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.warmup_bars < MIN_WARMUP_BARS {
            return Err(Error::Config(format!(
                "warmup_bars must be at least {MIN_WARMUP_BARS}, got {}",
                self.warmup_bars
            )));
        }
        if self.lookback < MIN_WARMUP_BARS {
            return Err(Error::Config(format!(
                "lookback must be at least {MIN_WARMUP_BARS}, got {}",
                self.lookback
            )));
        }
        self.range()?;
        Ok(())
    }

    fn range(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let start = self.start.as_deref().map(|s| parse_bound(s, NaiveTime::MIN)).transpose()?;
        let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
        let end = self.end.as_deref().map(|s| parse_bound(s, end_of_day)).transpose()?;
        Ok((start, end))
    }
}

fn parse_bound(raw: &str, date_time: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(date_time).and_utc())
        .map_err(|e| Error::Config(format!("invalid backtest date '{raw}': {e}")))
}

/// Receives progress while a backtest runs and may ask it to stop.
pub trait BacktestObserver: Send + Sync {
    /// `percent` is in `0..=100` and never decreases within a run.
    fn on_progress(&self, percent: f64);

    /// Polled at every bar boundary.
    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct NoopObserver;

impl BacktestObserver for NoopObserver {
    fn on_progress(&self, _percent: f64) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub direction: OrderSide,
    pub entry_price: f64,
    /// Current stop; breakeven and trailing move it towards profit.
    pub stop_loss: f64,
    pub initial_stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    pub open_index: usize,
    pub opened_at: DateTime<Utc>,
    pub trigger: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Stop hit after breakeven or trailing had moved it.
    ManagedStop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub direction: OrderSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub volume: f64,
    pub open_index: usize,
    pub close_index: usize,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    /// Strategy that led the entry decision.
    pub trigger: String,
}

/// Performance of the trades opened on one strategy's lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerStats {
    pub trades: usize,
    /// Fraction in `0..=1`, not a percentage.
    pub win_rate: f64,
    /// Gross profit over gross loss; `None` without a losing trade.
    pub profit_factor: Option<f64>,
    pub net_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub final_pnl: f64,
    pub trade_count: usize,
    /// Winning share of closed trades as a fraction in `0..=1` (0.55 means
    /// 55 %). Multiply by 100 for display.
    pub win_rate: f64,
    /// Gross profit over gross loss; `None` when no trade lost money.
    pub profit_factor: Option<f64>,
    /// Largest peak-to-trough equity decline, as a positive percentage.
    pub max_drawdown_percent: f64,
    /// Initial capital followed by the equity after each closed trade.
    pub equity_curve: Vec<f64>,
    pub trades: Vec<ClosedTrade>,
    /// Breakdown by the strategy that led each entry.
    pub by_trigger: BTreeMap<String, TriggerStats>,
}

impl BacktestResult {
    pub fn write_json(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Bar-by-bar replay of the decision pipeline with one position at a time.
#[derive(Debug)]
pub struct BacktestSimulator {
    pipeline: DecisionPipeline,
    config: BacktestConfig,
}

impl BacktestSimulator {
    pub fn new(pipeline: DecisionPipeline, config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { pipeline, config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay `bars`. Fails with `InsufficientData` when the date-filtered
    /// series does not extend past the warm-up, and with `Cancelled` when the
    /// observer asks to stop. No partial result is returned on failure.
    ///
    /// Each bar first settles the open position against its range, then moves
    /// the stop of a surviving position using the bar's close, then looks for
    /// an entry when flat.
    pub fn run(&self, bars: &[Bar], observer: &dyn BacktestObserver) -> Result<BacktestResult> {
        let (start, end) = self.config.range()?;
        let bars: Vec<Bar> = bars
            .iter()
            .filter(|b| start.map_or(true, |s| b.timestamp >= s) && end.map_or(true, |e| b.timestamp <= e))
            .copied()
            .collect();

        let warmup = self.config.warmup_bars;
        if bars.len() <= warmup {
            return Err(Error::InsufficientData { required: warmup + 1, available: bars.len() });
        }

        let total = bars.len() - warmup;
        let report_every = (total / 100).max(1);
        let contract_size = self.pipeline.instrument().contract_size;
        let sizer = self.pipeline.sizer();
        let management = &sizer.config().management;
        let pip_size = sizer.config().pip_size;

        let mut capital = self.config.initial_capital;
        let mut equity_curve = vec![capital];
        let mut trades: Vec<ClosedTrade> = Vec::new();
        let mut position: Option<SimulatedPosition> = None;
        let mut day = bars[warmup].timestamp.date_naive();
        let mut daily_pnl = 0.0;

        info!(bars = bars.len(), warmup, lookback = self.config.lookback, capital, "Backtest replay started");

        for i in warmup..bars.len() {
            if observer.is_cancelled() {
                info!(index = i, "Backtest cancelled");
                return Err(Error::Cancelled);
            }
            let bar = &bars[i];
            if bar.timestamp.date_naive() != day {
                day = bar.timestamp.date_naive();
                daily_pnl = 0.0;
            }

            if let Some(mut open) = position.take() {
                match exit_of(&open, bar) {
                    Some((exit_price, exit_reason)) => {
                        let pnl = (exit_price - open.entry_price)
                            * open.volume
                            * contract_size
                            * open.direction.sign();
                        capital += pnl;
                        daily_pnl += pnl;
                        equity_curve.push(capital);
                        info!(
                            side = %open.direction,
                            entry = open.entry_price,
                            exit = exit_price,
                            pnl,
                            capital,
                            reason = ?exit_reason,
                            "Position closed"
                        );
                        trades.push(ClosedTrade {
                            direction: open.direction,
                            entry_price: open.entry_price,
                            exit_price,
                            volume: open.volume,
                            open_index: open.open_index,
                            close_index: i,
                            opened_at: open.opened_at,
                            closed_at: bar.timestamp,
                            exit_reason,
                            pnl,
                            trigger: open.trigger,
                        });
                    }
                    None => {
                        if let Some(stop) = management.managed_stop(
                            open.direction,
                            open.entry_price,
                            open.initial_stop_loss,
                            open.stop_loss,
                            bar.close,
                            pip_size,
                        ) {
                            debug!(from = open.stop_loss, to = stop, index = i, "Stop moved");
                            open.stop_loss = stop;
                        }
                        position = Some(open);
                    }
                }
            }

            if position.is_none() {
                if sizer.is_daily_loss_limit_reached(capital, daily_pnl) {
                    debug!(%day, daily_pnl, "Daily loss limit active, no entries");
                } else {
                    let from = (i + 1).saturating_sub(self.config.lookback);
                    let decision = self.pipeline.evaluate(&bars[from..=i], capital);
                    if let Some(trade) = decision.trade {
                        debug!(
                            side = %trade.direction,
                            price = trade.entry,
                            volume = trade.volume,
                            trigger = %trade.trigger,
                            "Position opened"
                        );
                        position = Some(SimulatedPosition {
                            direction: trade.direction,
                            entry_price: trade.entry,
                            stop_loss: trade.stop_loss,
                            initial_stop_loss: trade.stop_loss,
                            take_profit: trade.take_profit,
                            volume: trade.volume,
                            open_index: i,
                            opened_at: bar.timestamp,
                            trigger: trade.trigger,
                        });
                    }
                }
            }

            let done = i - warmup + 1;
            if done % report_every == 0 && done < total {
                observer.on_progress(done as f64 * 100.0 / total as f64);
            }
        }
        observer.on_progress(100.0);

        if let Some(open) = &position {
            debug!(entry = open.entry_price, "Position still open at end, excluded");
        }

        let result = summarize(self.config.initial_capital, equity_curve, trades);
        info!(
            trades = result.trade_count,
            pnl = result.final_pnl,
            win_rate = result.win_rate,
            profit_factor = ?result.profit_factor,
            max_dd = result.max_drawdown_percent,
            "Backtest replay finished"
        );
        Ok(result)
    }
}

/// Stop-loss is checked before take-profit, so a bar touching both exits at
/// the stop.
fn exit_of(position: &SimulatedPosition, bar: &Bar) -> Option<(f64, ExitReason)> {
    let (stop_hit, target_hit) = match position.direction {
        OrderSide::Buy => (bar.low <= position.stop_loss, bar.high >= position.take_profit),
        OrderSide::Sell => (bar.high >= position.stop_loss, bar.low <= position.take_profit),
    };
    if stop_hit {
        let reason = if position.stop_loss == position.initial_stop_loss {
            ExitReason::StopLoss
        } else {
            ExitReason::ManagedStop
        };
        Some((position.stop_loss, reason))
    } else if target_hit {
        Some((position.take_profit, ExitReason::TakeProfit))
    } else {
        None
    }
}

/// Break-even trades count as losses.
fn trade_stats<'a>(trades: impl IntoIterator<Item = &'a ClosedTrade>) -> TriggerStats {
    let (mut count, mut wins, mut gross_win, mut gross_loss) = (0usize, 0usize, 0.0, 0.0);
    for t in trades {
        count += 1;
        if t.pnl > 0.0 {
            wins += 1;
            gross_win += t.pnl;
        } else {
            gross_loss -= t.pnl;
        }
    }
    TriggerStats {
        trades: count,
        win_rate: if count == 0 { 0.0 } else { wins as f64 / count as f64 },
        profit_factor: (gross_loss > 0.0).then(|| gross_win / gross_loss),
        net_pnl: gross_win - gross_loss,
    }
}

fn summarize(initial_capital: f64, equity_curve: Vec<f64>, trades: Vec<ClosedTrade>) -> BacktestResult {
    let final_equity = equity_curve.last().copied().unwrap_or(initial_capital);
    let overall = trade_stats(&trades);

    let mut by_name: BTreeMap<&str, Vec<&ClosedTrade>> = BTreeMap::new();
    for t in &trades {
        by_name.entry(t.trigger.as_str()).or_default().push(t);
    }
    let by_trigger = by_name
        .into_iter()
        .map(|(name, group)| (name.to_string(), trade_stats(group)))
        .collect();

    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &equity in &equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min((equity - peak) / peak);
        }
    }

    BacktestResult {
        final_pnl: final_equity - initial_capital,
        trade_count: trades.len(),
        win_rate: overall.win_rate,
        profit_factor: overall.profit_factor,
        max_drawdown_percent: -worst * 100.0,
        equity_curve,
        trades,
        by_trigger,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
