pub mod config;
pub mod fx;
pub mod management;
pub mod sizer;

pub use config::{RiskConfig, StopPolicy};
pub use fx::StaticFxRates;
pub use management::TradeManagementConfig;
pub use sizer::{calculate_sl_tp, RiskSizer};
