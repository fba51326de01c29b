use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use analysis::AnalysisConfig;
use common::{Error, InstrumentMeta, Result};
use engine::{BacktestConfig, DecisionPipeline};
use paper::PaperConfig;
use risk::{RiskConfig, RiskSizer, StaticFxRates};
use strategy::{Aggregator, ScoringConfig, StrategyScorer};

/// Top-level engine settings file (`config/engine.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub account_currency: String,
    /// Timeframe label passed to the bar source.
    pub timeframe: String,
    /// Bars fetched per live evaluation.
    pub bar_count: usize,
    pub analysis: AnalysisConfig,
    pub scoring: ScoringConfig,
    pub risk: RiskConfig,
    pub backtest: BacktestConfig,
    pub instrument: InstrumentMeta,
    pub fx: StaticFxRates,
    pub paper: PaperConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            account_currency: "USD".into(),
            timeframe: "H1".into(),
            bar_count: 500,
            analysis: AnalysisConfig::default(),
            scoring: ScoringConfig::default(),
            risk: RiskConfig::default(),
            backtest: BacktestConfig::default(),
            instrument: InstrumentMeta::default(),
            fx: StaticFxRates::default(),
            paper: PaperConfig::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }
        let settings = Self::from_toml(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), symbol = %settings.instrument.symbol, "Settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.scoring.validate()?;
        self.risk.validate()?;
        self.backtest.validate()?;
        if self.account_currency.trim().is_empty() {
            return Err(Error::Config("account_currency must not be empty".into()));
        }
        if self.bar_count == 0 {
            return Err(Error::Config("bar_count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Result<DecisionPipeline> {
        Ok(DecisionPipeline::new(
            StrategyScorer::from_config(&self.scoring),
            Aggregator::from_config(&self.scoring)?,
            RiskSizer::new(self.risk.clone(), Arc::new(self.fx.clone())),
            self.instrument.clone(),
            self.account_currency.clone(),
            self.scoring.execution_threshold,
        ))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use risk::StopPolicy;

    #[test]
    fn shipped_config_parses() {
        let settings = EngineSettings::from_toml(include_str!("../../../config/engine.toml")).unwrap();
        assert_eq!(settings.instrument.symbol, "EURUSD");
        assert_eq!(settings.scoring.weights.len(), 5);
        assert_eq!(settings.backtest.lookback, 500);
        assert!(!settings.risk.management.breakeven_enabled);
        assert!(settings.pipeline().is_ok());
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let settings = EngineSettings::from_toml("").unwrap();
        assert_eq!(settings.account_currency, "USD");
        assert_eq!(settings.backtest.warmup_bars, 200);
        assert!(settings.scoring.weights.is_empty());
        assert_eq!(settings.risk.stop_policy, StopPolicy::FixedPips);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml = r#"
            account_currency = "EUR"

            [risk]
            stop_policy = "atr"

            [fx]
            EURUSD = 1.08
        "#;
        let settings = EngineSettings::from_toml(toml).unwrap();
        assert_eq!(settings.risk.stop_policy, StopPolicy::Atr);
        assert_eq!(settings.risk.sl_pips, 20.0);
        assert_eq!(settings.account_currency, "EUR");
    }

    #[test]
    fn unsafe_values_are_rejected() {
        assert!(matches!(
            EngineSettings::from_toml("[scoring.weights]\nTREND = -1.0\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineSettings::from_toml("[backtest]\ninitial_capital = 0.0\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(EngineSettings::from_toml("bar_count = 0\n"), Err(Error::Config(_))));
        assert!(matches!(
            EngineSettings::from_toml("[backtest]\nwarmup_bars = 50\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = EngineSettings::load_or_default(Path::new("/nonexistent/engine.toml")).unwrap();
        assert_eq!(settings.timeframe, "H1");
    }
}
