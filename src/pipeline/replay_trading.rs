//! Replay Trading Module
//!
//! Runs a tick sequence through the same `Trader` used live, backed by the simulated
//! broker, and aggregates the closed trades into a performance report.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use super::performance::PerformanceReport;
use crate::config::ScalperConfig;
use crate::execution::position::ClosedTrade;
use crate::execution::simulated::SimulatedBroker;
use crate::trading_core::trader::{Trader, TraderStats};
use crate::types::Tick;

#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub trades: Vec<ClosedTrade>,
    pub stats: TraderStats,
    pub report: PerformanceReport,
}

pub struct ReplayCoordinator {
    trader: Trader<SimulatedBroker>,
    completed: Vec<ClosedTrade>,
    session_day: Option<NaiveDate>,
}

impl ReplayCoordinator {
    pub fn new(config: &ScalperConfig) -> Result<Self> {
        Ok(Self {
            trader: Trader::new(config, SimulatedBroker::new())?,
            completed: Vec::new(),
            session_day: None,
        })
    }

    pub fn trader(&self) -> &Trader<SimulatedBroker> {
        &self.trader
    }

    pub fn completed(&self) -> &[ClosedTrade] {
        &self.completed
    }

    pub fn process_tick(&mut self, tick: &Tick) {
        // Each UTC day is a new risk session
        let day = tick.timestamp.date_naive();
        if self.session_day.is_some_and(|d| d != day) {
            self.trader.reset_session();
        }
        self.session_day = Some(day);

        let closed = self.trader.step(tick);
        self.record(closed);
    }

    fn record(&mut self, closed: Vec<ClosedTrade>) {
        for trade in closed {
            debug!(
                "Recorded {} ({} trades so far)",
                trade.ticket,
                self.completed.len() + 1
            );
            self.completed.push(trade);
        }
    }

    /// Close remaining trades at the last quote and build the report
    pub fn finish(mut self) -> ReplayResult {
        let closed = self.trader.finish();
        self.record(closed);

        let report = PerformanceReport::from_trades(&self.completed);
        ReplayResult {
            trades: self.completed,
            stats: self.trader.stats(),
            report,
        }
    }
}

/// Replay `ticks` from a fresh state
pub fn run_replay(config: &ScalperConfig, ticks: &[Tick]) -> Result<ReplayResult> {
    info!("=== REPLAY TRADING ===");
    info!(
        "Symbol: {} | {} ticks per candle | {} ticks",
        config.symbol,
        config.candles.ticks_per_candle,
        ticks.len()
    );

    let mut coordinator = ReplayCoordinator::new(config)?;
    for tick in ticks {
        coordinator.process_tick(tick);
    }
    let result = coordinator.finish();

    info!(
        "Processed {} ticks, {} candles | {} signals ({} skipped) | {} trades",
        result.stats.ticks_processed,
        result.stats.candles_closed,
        result.stats.signals,
        result.stats.signals_skipped,
        result.trades.len()
    );
    Ok(result)
}
