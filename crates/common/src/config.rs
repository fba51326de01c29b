/// Runtime paths loaded from environment variables at startup.
/// Every value can be overridden on the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file with analysis, scoring, risk and backtest settings.
    pub engine_config_path: String,

    // Bar files
    pub bars_csv_path: Option<String>,
    pub htf_bars_csv_path: Option<String>,

    /// Where the backtest result JSON is written.
    pub result_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }

        Config {
            engine_config_path: optional_env("ENGINE_CONFIG_PATH")
                .unwrap_or_else(|| "config/engine.toml".to_string()),
            bars_csv_path: optional_env("BARS_CSV_PATH"),
            htf_bars_csv_path: optional_env("HTF_BARS_CSV_PATH"),
            result_path: optional_env("RESULT_PATH")
                .unwrap_or_else(|| "backtest_result.json".to_string()),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
