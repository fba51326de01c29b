use serde::{Deserialize, Serialize};

use common::{Error, OrderSide, Result};

/// `[risk.management]` section: moves the stop of an open position once price
/// has run in its favour. Distances are multiples of the initial risk `R`,
/// the gap between entry and the original stop.
///
/// ```toml
/// [risk.management]
/// breakeven_enabled = true
/// breakeven_trigger_rr = 1.0
/// trailing_enabled = true
/// trailing_trigger_rr = 2.0
/// trailing_distance_rr = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeManagementConfig {
    pub breakeven_enabled: bool,
    /// Open profit, in `R`, that moves the stop to entry.
    pub breakeven_trigger_rr: f64,
    /// Pips locked in beyond entry when breakeven fires.
    pub breakeven_lock_pips: f64,
    pub trailing_enabled: bool,
    /// Open profit, in `R`, before the stop starts trailing.
    pub trailing_trigger_rr: f64,
    /// Gap kept between price and the trailed stop, in `R`.
    pub trailing_distance_rr: f64,
}

impl Default for TradeManagementConfig {
    fn default() -> Self {
        Self {
            breakeven_enabled: false,
            breakeven_trigger_rr: 1.0,
            breakeven_lock_pips: 0.0,
            trailing_enabled: false,
            trailing_trigger_rr: 2.0,
            trailing_distance_rr: 1.0,
        }
    }
}

impl TradeManagementConfig {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("breakeven_trigger_rr", self.breakeven_trigger_rr),
            ("trailing_trigger_rr", self.trailing_trigger_rr),
            ("trailing_distance_rr", self.trailing_distance_rr),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("management.{key} must be positive, got {value}")));
            }
        }
        if !(self.breakeven_lock_pips.is_finite() && self.breakeven_lock_pips >= 0.0) {
            return Err(Error::Config(format!(
                "management.breakeven_lock_pips must not be negative, got {}",
                self.breakeven_lock_pips
            )));
        }
        Ok(())
    }

    /// New stop for a position at `price`, or `None` to leave it alone.
    ///
    /// Trailing wins over breakeven. A stop only ever moves towards profit,
    /// and a trailed stop must also be past entry.
    pub fn managed_stop(
        &self,
        side: OrderSide,
        entry: f64,
        initial_stop: f64,
        current_stop: f64,
        price: f64,
        pip_size: f64,
    ) -> Option<f64> {
        let s = side.sign();
        let risk = (entry - initial_stop) * s;
        if !(risk > 0.0) {
            return None;
        }
        let profit = (price - entry) * s;
        let beyond = |level: f64, reference: f64| (level - reference) * s > 0.0;

        if self.trailing_enabled && profit >= risk * self.trailing_trigger_rr {
            let trailed = price - s * risk * self.trailing_distance_rr;
            if beyond(trailed, current_stop) && beyond(trailed, entry) {
                return Some(trailed);
            }
        }

        let at_or_past_entry = (current_stop - entry) * s >= 0.0;
        if self.breakeven_enabled && !at_or_past_entry && profit >= risk * self.breakeven_trigger_rr {
            let breakeven = entry + s * self.breakeven_lock_pips * pip_size;
            if beyond(breakeven, current_stop) {
                return Some(breakeven);
            }
        }
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
