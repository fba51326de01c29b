use serde::{Deserialize, Serialize};

use common::{Error, Result};

use crate::management::TradeManagementConfig;

/// How stop-loss and take-profit distances are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Fixed `sl_pips` / `tp_pips` offsets.
    #[default]
    FixedPips,
    /// Multiples of the average true range.
    Atr,
}

/// User-configurable risk parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Share of equity risked per trade (e.g. 0.01 = 1%).
    pub risk_fraction: f64,
    pub sl_pips: f64,
    pub tp_pips: f64,
    /// Price value of one pip (0.0001 for most FX majors).
    pub pip_size: f64,
    /// Realized daily loss, as a share of equity, that stops new entries.
    /// Zero or negative disables the check.
    pub daily_loss_limit_fraction: f64,
    pub stop_policy: StopPolicy,
    pub atr_period: usize,
    pub atr_sl_multiple: f64,
    pub atr_tp_multiple: f64,
    /// Breakeven and trailing stop for open positions.
    pub management: TradeManagementConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            sl_pips: 20.0,
            tp_pips: 40.0,
            pip_size: 0.0001,
            daily_loss_limit_fraction: 0.02,
            stop_policy: StopPolicy::FixedPips,
            atr_period: 14,
            atr_sl_multiple: 1.5,
            atr_tp_multiple: 3.0,
            management: TradeManagementConfig::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "risk_fraction must be within (0, 1], got {}",
                self.risk_fraction
            )));
        }
        for (key, value) in [
            ("sl_pips", self.sl_pips),
            ("tp_pips", self.tp_pips),
            ("pip_size", self.pip_size),
            ("atr_sl_multiple", self.atr_sl_multiple),
            ("atr_tp_multiple", self.atr_tp_multiple),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{key} must be positive, got {value}")));
            }
        }
        if self.atr_period == 0 {
            return Err(Error::Config("atr_period must be at least 1".into()));
        }
        self.management.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn non_positive_risk_fraction_is_rejected() {
        let cfg = RiskConfig { risk_fraction: 0.0, ..RiskConfig::default() };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn policy_parses_snake_case() {
        let cfg: RiskConfig = toml::from_str("stop_policy = \"atr\"\nsl_pips = 15.0").unwrap();
        assert_eq!(cfg.stop_policy, StopPolicy::Atr);
        assert_eq!(cfg.sl_pips, 15.0);
        assert_eq!(cfg.tp_pips, 40.0);
        assert!(!cfg.management.trailing_enabled);
    }

    #[test]
    fn management_table_parses() {
        let cfg: RiskConfig =
            toml::from_str("[management]\nbreakeven_enabled = true\ntrailing_distance_rr = 1.5").unwrap();
        assert!(cfg.management.breakeven_enabled);
        assert_eq!(cfg.management.trailing_distance_rr, 1.5);
        assert_eq!(cfg.management.trailing_trigger_rr, 2.0);

        let bad = RiskConfig {
            management: TradeManagementConfig { breakeven_trigger_rr: -1.0, ..Default::default() },
            ..RiskConfig::default()
        };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
    }
}
