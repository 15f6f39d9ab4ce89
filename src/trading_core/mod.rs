//! Trading Core - strategy logic shared by replay and live trading
//!
//! This module contains the core strategy components:
//! - Candle aggregation from ticks
//! - Incremental indicators (EMA, slope, average range)
//! - Trend, impulse, pullback, structure and entry checks
//! - Session/news gating
//! - The strategy state machine and the per-tick trader

pub mod ring;
pub mod candles;
pub mod indicators;
pub mod trend;
pub mod impulse;
pub mod pullback;
pub mod structure;
pub mod entry;
pub mod session;
pub mod state_machine;
pub mod trader;

// Re-export commonly used types
pub use ring::RingBuffer;
pub use candles::{CandleConfig, TickAggregator};
pub use indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
pub use trend::{TrendAnalyzer, TrendConfig};
pub use impulse::{ImpulseConfig, ImpulseDetector, ImpulseLeg};
pub use pullback::{PullbackConfig, PullbackQualifier, PullbackVerdict};
pub use structure::{StructureBreak, StructureConfig, StructureMonitor};
pub use entry::{EntryConfig, EntryTrigger};
pub use session::{AllOf, AlwaysOpen, NewsBlackout, SessionConfig, SessionGate, SessionWindow, SessionWindows};
pub use state_machine::{
    ResetReason, Setup, Signal, StrategyConfig, StrategyState, StrategyStateMachine, StrategyTransition,
};
pub use trader::{Trader, TraderStats};
