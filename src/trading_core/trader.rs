//! Core Trading Logic
//!
//! Broker-agnostic per-tick driver used by both:
//! - Replay testing (historical or synthetic ticks against the simulated broker)
//! - Live trading (a terminal bridge implementing `Broker`)
//!
//! This module contains no broker-specific code.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::candles::TickAggregator;
use super::indicators::IndicatorEngine;
use super::state_machine::{StrategyState, StrategyStateMachine, StrategyTransition};
use crate::config::ScalperConfig;
use crate::execution::broker::{Broker, ExitReason};
use crate::execution::position::{ClosedTrade, TradeLifecycleManager};
use crate::execution::risk::RiskManager;
use crate::pips::PipScale;
use crate::types::Tick;

/// Counters for the run so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraderStats {
    pub ticks_processed: u64,
    pub candles_closed: u64,
    pub signals: u32,
    pub signals_skipped: u32,
    pub trades_opened: u32,
}

pub struct Trader<B: Broker> {
    symbol: String,
    scale: PipScale,
    max_spread_pips: f64,
    aggregator: TickAggregator,
    indicators: IndicatorEngine,
    strategy: StrategyStateMachine,
    risk: RiskManager,
    trades: TradeLifecycleManager,
    broker: B,
    last_tick: Option<Tick>,
    stats: TraderStats,
}

impl<B: Broker> Trader<B> {
    pub fn new(config: &ScalperConfig, broker: B) -> Result<Self> {
        let scale = PipScale::for_symbol(&config.symbol);
        let aggregator =
            TickAggregator::new(&config.candles).context("invalid candle configuration")?;
        let gate = config
            .session
            .build_gate()
            .context("invalid session configuration")?;

        Ok(Self {
            symbol: config.symbol.clone(),
            scale,
            max_spread_pips: config.max_spread_pips,
            aggregator,
            indicators: IndicatorEngine::new(&config.indicators),
            strategy: StrategyStateMachine::new(config.strategy.clone(), scale)
                .with_session_gate(gate),
            risk: RiskManager::new(config.risk.clone(), scale),
            trades: TradeLifecycleManager::new(config.lifecycle.clone(), &config.symbol),
            broker,
            last_tick: None,
            stats: TraderStats::default(),
        })
    }

    pub fn state(&self) -> StrategyState {
        self.strategy.state()
    }

    pub fn stats(&self) -> TraderStats {
        self.stats
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn trades(&self) -> &TradeLifecycleManager {
        &self.trades
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Session boundary: clear the risk counters
    pub fn reset_session(&mut self) {
        self.risk.reset_session();
    }

    /// Process one tick and return any trades closed on it.
    ///
    /// Order within a tick: broker-side closures, tick-level trigger, candle step,
    /// trade management.
    pub fn step(&mut self, tick: &Tick) -> Vec<ClosedTrade> {
        if tick.symbol != self.symbol {
            debug!("Ignoring tick for {} (trading {})", tick.symbol, self.symbol);
            return Vec::new();
        }
        self.stats.ticks_processed += 1;
        self.last_tick = Some(tick.clone());

        // 1. Stops/targets filled by the broker
        let closures = self.broker.sync(tick);
        let mut closed = self.trades.reconcile(&closures, tick, &mut self.risk);

        // 2. Tick-level breakout while armed
        if self.strategy.state() == StrategyState::WaitingTrigger {
            let spread_pips = self.scale.to_pips(tick.spread);
            if spread_pips <= self.max_spread_pips {
                if let Some(transition) = self.strategy.on_tick(tick, &self.risk) {
                    self.handle_transition(transition);
                }
            } else {
                debug!("Spread {:.1} pips too wide for tick trigger", spread_pips);
            }
        }

        // 3. Candle close
        if let Some(candle) = self.aggregator.process(tick) {
            self.stats.candles_closed += 1;
            let snapshot = self.indicators.update(&candle);
            debug!(
                "Candle {} O {:.5} H {:.5} L {:.5} C {:.5} | EMA {:.5} | state {}",
                candle.index,
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                snapshot.ema,
                self.strategy.state()
            );
            if let Some(transition) = self.strategy.on_candle(&candle, &snapshot, &self.risk) {
                self.handle_transition(transition);
            }
            self.trades.on_candle_closed();
        }

        // 4. Break-even, time stop, external closes
        closed.extend(self.trades.manage(&mut self.broker, &mut self.risk));
        closed
    }

    fn handle_transition(&mut self, transition: StrategyTransition) {
        let StrategyTransition::SignalEmitted(signal) = transition else {
            return;
        };
        self.stats.signals += 1;

        if !self.risk.can_trade() {
            self.stats.signals_skipped += 1;
            let counters = self.risk.counters();
            info!(
                "SKIPPED: {} signal (trades this session {}, consecutive losses {})",
                signal.direction, counters.trades_this_session, counters.consecutive_losses
            );
            return;
        }

        if self.trades.open(&signal, &mut self.broker).is_some() {
            self.risk.register_new_trade();
            self.stats.trades_opened += 1;
        }
    }

    /// Close whatever is still open at the last seen quote
    pub fn finish(&mut self) -> Vec<ClosedTrade> {
        let Some(tick) = self.last_tick.clone() else {
            return Vec::new();
        };

        let open: Vec<_> = self.trades.active_trades().map(|t| t.ticket).collect();
        for ticket in open {
            if let Err(e) = self.broker.close_position(ticket) {
                warn!("End-of-data close failed for {}: {:#}", ticket, e);
            }
        }
        self.trades
            .close_all(&tick, ExitReason::EndOfData, &mut self.risk)
    }
}
