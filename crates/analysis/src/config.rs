use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Swing and zone detection parameters.
///
/// Example `[analysis]` section:
/// ```toml
/// [analysis]
/// htf_order = 5
/// ltf_order = 3
/// liquidity_tolerance = 0.0005
/// order_block_lookahead = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bars on each side of a higher-timeframe swing point.
    pub htf_order: usize,
    /// Bars on each side of a lower-timeframe swing point.
    pub ltf_order: usize,
    /// Relative distance under which two swings count as equal (0.0005 = 0.05%).
    pub liquidity_tolerance: f64,
    /// Bars after the displacement candle searched for the confirming imbalance.
    pub order_block_lookahead: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            htf_order: 5,
            ltf_order: 3,
            liquidity_tolerance: 0.0005,
            order_block_lookahead: 5,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.htf_order == 0 || self.ltf_order == 0 {
            return Err(Error::Config("swing orders must be at least 1".into()));
        }
        if !self.liquidity_tolerance.is_finite() || self.liquidity_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "liquidity_tolerance must be a non-negative number, got {}",
                self.liquidity_tolerance
            )));
        }
        Ok(())
    }
}
