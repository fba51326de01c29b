use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use common::{Error, Result};

/// `[scoring]` section of the engine settings.
///
/// Example:
/// ```toml
/// [scoring]
/// execution_threshold = 60.0
///
/// [scoring.weights]
/// TREND = 0.3
/// SMC = 0.4
/// VOL_BRK = 0.3
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Strategy name → weight. Empty means every strategy counts equally;
    /// otherwise strategies left out contribute nothing.
    pub weights: BTreeMap<String, f64>,
    /// Minimum aggregated score required to act on a decision.
    pub execution_threshold: f64,
    /// Fewer bars than this yields no signals at all.
    pub min_bars: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            execution_threshold: 60.0,
            min_bars: 50,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.execution_threshold) {
            return Err(Error::Config(format!(
                "execution_threshold must be within 0..=100, got {}",
                self.execution_threshold
            )));
        }
        if let Some((name, w)) = self.weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(Error::Config(format!("weight for {name} must be non-negative, got {w}")));
        }
        Ok(())
    }

    /// Parse a standalone `[scoring]` TOML fragment.
    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg = ScoringConfig::from_toml("execution_threshold = 70.0").unwrap();
        assert_eq!(cfg.execution_threshold, 70.0);
        assert_eq!(cfg.min_bars, 50);
        assert!(cfg.weights.is_empty());
    }

    #[test]
    fn parses_weight_table() {
        let cfg = ScoringConfig::from_toml("[weights]\nTREND = 0.5\nSMC = 1.5\n").unwrap();
        assert_eq!(cfg.weights.get("SMC"), Some(&1.5));
    }

    #[test]
    fn rejects_negative_weight() {
        let err = ScoringConfig::from_toml("[weights]\nTREND = -1.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        assert!(ScoringConfig::from_toml("execution_threshold = 120.0").is_err());
    }
}
