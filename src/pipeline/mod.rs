//! Replay pipeline: tick sources, the replay coordinator and the performance report

pub mod feed;
pub mod performance;
pub mod replay_trading;

pub use feed::{load_csv, scripted_ticks, synthetic_ticks, RawTick, SyntheticConfig, TickNormalizer};
pub use performance::{max_drawdown, PerformanceReport};
pub use replay_trading::{run_replay, ReplayResult};
