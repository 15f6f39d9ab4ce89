// Library crate - exports the strategy core, execution layer and replay pipeline

pub mod types;
pub mod error;
pub mod pips;
pub mod config;
pub mod trading_core;
pub mod execution;
pub mod pipeline;

// Re-export commonly used types
pub use types::*;
pub use error::{MarketDataError, SessionError, SignalError};
pub use pips::PipScale;
pub use config::{load_config, ScalperConfig};
