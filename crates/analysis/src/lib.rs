//! Market structure classification and price-action pattern detection.
//!
//! Everything in this crate is a pure function of the bar slices passed in:
//! no state is retained between calls, so analyzers can be shared across
//! threads freely.

pub mod config;
pub mod entry;
pub mod fibonacci;
pub mod patterns;
pub mod structure;

pub use config::AnalysisConfig;
pub use entry::{EntryFinder, EntrySetup, PoiKind};
pub use fibonacci::FibonacciZones;
pub use patterns::{
    liquidity_grab, ImbalanceZone, LiquidityGrab, LiquidityZones, OrderBlockZone, PatternDetector,
    PatternOutput, ZoneKind,
};
pub use structure::{
    MarketBias, StructureAnalyzer, StructureBreak, StructureEvent, StructureOutput, SwingKind,
    SwingPoint,
};
