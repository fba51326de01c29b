pub mod atr;
pub mod bollinger;
pub mod donchian;
pub mod macd;
pub mod rsi;

pub use atr::atr;
pub use bollinger::{sma, std_dev, Bands, Bollinger};
pub use donchian::{donchian, Channel};
pub use macd::{ema_series, Macd, MacdSnapshot};
pub use rsi::RsiIndicator;
