use std::sync::Arc;

use tracing::{debug, info, warn};

use common::{Direction, FxRateProvider, InstrumentMeta, SizingFailure};

use crate::config::{RiskConfig, StopPolicy};
use crate::fx::StaticFxRates;

/// Currencies tried, in order, as the middle leg of a cross rate.
const PIVOT_CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

/// Guards the floor-to-step against `0.3 / 0.1 = 2.9999999999999996`.
const STEP_EPSILON: f64 = 1e-9;

/// Turns a trade decision into a position size that risks a fixed share of
/// equity, plus the stop and target prices for it.
#[derive(Clone)]
pub struct RiskSizer {
    config: RiskConfig,
    fx: Arc<dyn FxRateProvider>,
}

impl std::fmt::Debug for RiskSizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskSizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RiskSizer {
    pub fn new(config: RiskConfig, fx: Arc<dyn FxRateProvider>) -> Self {
        Self { config, fx }
    }

    /// Sizer for accounts that only trade instruments quoted in their own
    /// currency.
    pub fn without_fx(config: RiskConfig) -> Self {
        Self::new(config, Arc::new(StaticFxRates::default()))
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Volume (in lots) such that being stopped out loses
    /// `equity × risk_fraction` in the account currency.
    ///
    /// The raw volume is floored to the instrument's volume step and capped at
    /// its maximum. A volume that ends up below the instrument minimum is
    /// refused rather than raised, since the minimum lot would risk more than
    /// configured.
    pub fn calculate_volume(
        &self,
        equity: f64,
        entry_price: f64,
        stop_price: f64,
        instrument: &InstrumentMeta,
        account_currency: &str,
    ) -> Result<f64, SizingFailure> {
        if !(equity.is_finite() && equity > 0.0) {
            return Err(SizingFailure::NonPositiveEquity(equity));
        }
        validate_instrument(instrument)?;

        let risk_amount = equity * self.config.risk_fraction;
        let distance = (entry_price - stop_price).abs();
        if !(distance.is_finite() && distance > 0.0) || distance < instrument.tick_size {
            return Err(SizingFailure::StopTooClose {
                distance,
                tick_size: instrument.tick_size,
            });
        }

        let loss_per_lot = distance * instrument.contract_size;
        let rate = self
            .conversion_rate(&instrument.profit_currency, account_currency)
            .ok_or_else(|| SizingFailure::NoConversionRate {
                from: instrument.profit_currency.clone(),
                to: account_currency.to_string(),
            })?;
        let loss_per_lot_account = loss_per_lot * rate;

        let raw = risk_amount / loss_per_lot_account;
        let capped = raw.min(instrument.volume_max);
        let steps = (capped / instrument.volume_step + STEP_EPSILON).floor();
        let volume = (steps * instrument.volume_step).max(0.0);

        if volume <= 0.0 || volume + STEP_EPSILON < instrument.volume_min {
            warn!(
                raw,
                volume,
                min = instrument.volume_min,
                symbol = %instrument.symbol,
                "Volume below instrument minimum, not sizing"
            );
            return Err(SizingFailure::BelowMinimumVolume {
                volume,
                min: instrument.volume_min,
            });
        }

        debug!(
            risk_amount,
            distance,
            loss_per_lot_account,
            raw,
            volume,
            "Sized position"
        );
        Ok(volume)
    }

    /// Units of `to` received for one unit of `from`.
    ///
    /// Prefers the `to + from` quote (inverted), then the `from + to` quote,
    /// then a cross through each pivot currency.
    pub fn conversion_rate(&self, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(1.0);
        }
        if let Some(rate) = self.quoted_rate(from, to) {
            return Some(rate);
        }

        for pivot in PIVOT_CURRENCIES {
            if from.eq_ignore_ascii_case(pivot) || to.eq_ignore_ascii_case(pivot) {
                continue;
            }
            if let (Some(a), Some(b)) = (self.quoted_rate(from, pivot), self.quoted_rate(pivot, to)) {
                debug!(from, to, pivot, rate = a * b, "Using cross rate");
                return Some(a * b);
            }
        }
        warn!(from, to, "No conversion rate available");
        None
    }

    fn quoted_rate(&self, from: &str, to: &str) -> Option<f64> {
        self.fx
            .rate(to, from)
            .map(|r| 1.0 / r)
            .or_else(|| self.fx.rate(from, to))
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Stop and target for `direction` at `price` under the configured policy.
    /// The ATR policy needs `atr`; without it no levels are produced.
    pub fn stops(&self, price: f64, direction: Direction, atr: Option<f64>) -> Option<(f64, f64)> {
        match self.config.stop_policy {
            StopPolicy::FixedPips => calculate_sl_tp(
                price,
                direction,
                self.config.sl_pips,
                self.config.tp_pips,
                self.config.pip_size,
            ),
            StopPolicy::Atr => match atr {
                Some(atr) if atr > 0.0 => self.calculate_sl_tp_atr(price, direction, atr),
                _ => {
                    warn!("ATR unavailable, no stop levels");
                    None
                }
            },
        }
    }

    pub fn calculate_sl_tp_atr(&self, price: f64, direction: Direction, atr: f64) -> Option<(f64, f64)> {
        let sl = atr * self.config.atr_sl_multiple;
        let tp = atr * self.config.atr_tp_multiple;
        offset_levels(price, direction, sl, tp)
    }

    /// True once today's realized loss reaches `equity × daily_loss_limit_fraction`.
    pub fn is_daily_loss_limit_reached(&self, equity: f64, daily_pnl: f64) -> bool {
        let fraction = self.config.daily_loss_limit_fraction;
        if fraction <= 0.0 {
            return false;
        }
        let reached = daily_pnl < 0.0 && daily_pnl.abs() >= equity * fraction;
        if reached {
            info!(daily_pnl, limit = equity * fraction, "Daily loss limit reached");
        }
        reached
    }
}

/// Stop and target at fixed pip offsets from `price`. `None` for `Neutral`.
pub fn calculate_sl_tp(
    price: f64,
    direction: Direction,
    sl_pips: f64,
    tp_pips: f64,
    pip_size: f64,
) -> Option<(f64, f64)> {
    offset_levels(price, direction, sl_pips * pip_size, tp_pips * pip_size)
}

fn offset_levels(price: f64, direction: Direction, sl: f64, tp: f64) -> Option<(f64, f64)> {
    match direction {
        Direction::Buy => Some((price - sl, price + tp)),
        Direction::Sell => Some((price + sl, price - tp)),
        Direction::Neutral => None,
    }
}

fn validate_instrument(meta: &InstrumentMeta) -> Result<(), SizingFailure> {
    let invalid = |msg: String| Err(SizingFailure::InvalidInstrument(msg));
    if !(meta.tick_size.is_finite() && meta.tick_size > 0.0) {
        return invalid(format!("{}: tick_size must be positive", meta.symbol));
    }
    if !(meta.volume_step > 0.0) {
        return invalid(format!("{}: volume_step must be positive", meta.symbol));
    }
    if !(meta.contract_size > 0.0) {
        return invalid(format!("{}: contract_size must be positive", meta.symbol));
    }
    if !(meta.volume_min >= 0.0 && meta.volume_min <= meta.volume_max) {
        return invalid(format!("{}: volume_min must not exceed volume_max", meta.symbol));
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
