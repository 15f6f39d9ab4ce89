//! Execution module
//!
//! Risk sizing and gating, the broker capability trait, the simulated broker used for
//! replay, and trade lifecycle management.

pub mod config;
pub mod risk;
pub mod broker;
pub mod simulated;
pub mod position;

pub use config::{LifecycleConfig, RiskConfig};
pub use risk::{RiskCounters, RiskManager};
pub use broker::{Broker, ExitReason, MarketOrder};
pub use simulated::{SimPosition, SimulatedBroker};
pub use position::{ClosedTrade, Trade, TradeLifecycleManager};
