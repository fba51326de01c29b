//! Simulated collaborators for running the engine without a broker.

pub mod bars;
pub mod gateway;

pub use bars::CsvBarSource;
pub use gateway::{PaperConfig, PaperGateway};
