//! Trade lifecycle management
//!
//! Opens trades from signals, tracks them by broker ticket, and closes them on external
//! stop/target fills, the time stop, or end of data. Each closed trade reports its outcome
//! to the risk manager exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::broker::{Broker, ExitReason, MarketOrder};
use super::config::LifecycleConfig;
use super::risk::RiskManager;
use crate::pips::PipScale;
use crate::trading_core::state_machine::Signal;
use crate::types::{Direction, Tick, Ticket};

/// An open trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub sl: f64,
    pub tp: f64,
    /// Stop moved to entry (sticky)
    pub be_moved: bool,
    pub candles_held: u32,
    /// Price reached the target at some point (sticky)
    pub tp_touched: bool,
    pub result_registered: bool,
    pub exit_reason: Option<ExitReason>,
    pub opened_at: DateTime<Utc>,
}

impl Trade {
    /// Latch `tp_touched` if the quote has reached the target
    fn observe(&mut self, tick: &Tick) {
        let touched = match self.direction {
            Direction::Buy => tick.bid >= self.tp,
            Direction::Sell => tick.ask <= self.tp,
        };
        self.tp_touched |= touched;
    }

    fn stop_reached(&self, tick: &Tick) -> bool {
        match self.direction {
            Direction::Buy => tick.bid <= self.sl,
            Direction::Sell => tick.ask >= self.sl,
        }
    }
}

/// Trade-closed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticket: Ticket,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit_pips: f64,
    pub exit_reason: ExitReason,
    /// Outcome reported to risk (target touched)
    pub win: bool,
    pub candles_held: u32,
    pub closed_at: DateTime<Utc>,
}

pub struct TradeLifecycleManager {
    config: LifecycleConfig,
    symbol: String,
    scale: PipScale,
    active: BTreeMap<Ticket, Trade>,
}

impl TradeLifecycleManager {
    pub fn new(config: LifecycleConfig, symbol: &str) -> Self {
        Self {
            config,
            symbol: symbol.to_string(),
            scale: PipScale::for_symbol(symbol),
            active: BTreeMap::new(),
        }
    }

    pub fn active_trades(&self) -> impl Iterator<Item = &Trade> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn trade(&self, ticket: Ticket) -> Option<&Trade> {
        self.active.get(&ticket)
    }

    /// Place a market order for the signal. Broker failures are logged and yield None.
    pub fn open<B: Broker>(&mut self, signal: &Signal, broker: &mut B) -> Option<Ticket> {
        let order = MarketOrder {
            symbol: self.symbol.clone(),
            direction: signal.direction,
            volume: self.config.volume,
            sl: signal.sl,
            tp: signal.tp,
            comment: self.config.order_comment.clone(),
        };

        info!(
            "Executing {} signal for {} @ {:.5} (SL {:.5}, TP {:.5})",
            signal.direction, self.symbol, signal.entry_price, signal.sl, signal.tp
        );

        let ticket = match broker.place_market_order(&order) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Failed to open {} trade for {}: {:#}", signal.direction, self.symbol, e);
                return None;
            }
        };

        self.active.insert(
            ticket,
            Trade {
                ticket,
                symbol: self.symbol.clone(),
                direction: signal.direction,
                entry_price: signal.entry_price,
                sl: signal.sl,
                tp: signal.tp,
                be_moved: false,
                candles_held: 0,
                tp_touched: false,
                result_registered: false,
                exit_reason: None,
                opened_at: signal.timestamp,
            },
        );
        info!("Trade opened. Ticket: {}", ticket);
        Some(ticket)
    }

    /// Count a closed candle against every open trade
    pub fn on_candle_closed(&mut self) {
        for trade in self.active.values_mut() {
            trade.candles_held += 1;
        }
    }

    /// Close trades the broker reported as filled by its own stop/target engine
    pub fn reconcile(
        &mut self,
        closures: &[(Ticket, ExitReason)],
        tick: &Tick,
        risk: &mut RiskManager,
    ) -> Vec<ClosedTrade> {
        closures
            .iter()
            .filter_map(|&(ticket, reason)| {
                if let Some(trade) = self.active.get_mut(&ticket) {
                    trade.observe(tick);
                }
                self.finalize(ticket, reason, tick, risk)
            })
            .collect()
    }

    /// Poll every open trade: detect external closes, move stops to break-even, apply the
    /// time stop. Does nothing when the broker has no quote.
    pub fn manage<B: Broker>(&mut self, broker: &mut B, risk: &mut RiskManager) -> Vec<ClosedTrade> {
        let Some(tick) = broker.get_tick(&self.symbol) else {
            return Vec::new();
        };

        let mut closed = Vec::new();
        let tickets: Vec<Ticket> = self.active.keys().copied().collect();

        for ticket in tickets {
            let Some(trade) = self.active.get_mut(&ticket) else {
                continue;
            };
            trade.observe(&tick);

            if !broker.position_exists(ticket) {
                let reason = if trade.tp_touched {
                    ExitReason::TakeProfit
                } else if trade.stop_reached(&tick) {
                    ExitReason::StopLoss
                } else {
                    ExitReason::ClosedExternally
                };
                info!("Trade {} closed by broker ({})", ticket, reason);
                closed.extend(self.finalize(ticket, reason, &tick, risk));
                continue;
            }

            if !trade.be_moved
                && risk.should_move_to_be(
                    trade.direction,
                    trade.entry_price,
                    tick.exit_price(trade.direction),
                )
            {
                match broker.modify_sl(ticket, trade.entry_price) {
                    Ok(()) => {
                        trade.be_moved = true;
                        trade.sl = trade.entry_price;
                        info!("Moved trade {} to break-even @ {:.5}", ticket, trade.entry_price);
                    }
                    Err(e) => warn!("Break-even move failed for {}: {:#}", ticket, e),
                }
            }

            if trade.candles_held >= self.config.time_stop_candles {
                info!(
                    "Time stop reached for trade {} after {} candles",
                    ticket, trade.candles_held
                );
                match broker.close_position(ticket) {
                    Ok(()) => closed.extend(self.finalize(ticket, ExitReason::TimeStop, &tick, risk)),
                    Err(e) => warn!("Time-stop close failed for {}: {:#}", ticket, e),
                }
            }
        }

        closed
    }

    /// Close every remaining trade at the given quote
    pub fn close_all(
        &mut self,
        tick: &Tick,
        reason: ExitReason,
        risk: &mut RiskManager,
    ) -> Vec<ClosedTrade> {
        let tickets: Vec<Ticket> = self.active.keys().copied().collect();
        tickets
            .into_iter()
            .filter_map(|ticket| self.finalize(ticket, reason, tick, risk))
            .collect()
    }

    /// Remove the trade, report its outcome once, and build the closed-trade event
    fn finalize(
        &mut self,
        ticket: Ticket,
        reason: ExitReason,
        tick: &Tick,
        risk: &mut RiskManager,
    ) -> Option<ClosedTrade> {
        let mut trade = self.active.remove(&ticket)?;
        trade.exit_reason = Some(reason);

        let exit_price = tick.exit_price(trade.direction);
        let profit_pips = self
            .scale
            .to_pips(trade.direction.sign() * (exit_price - trade.entry_price));

        if !trade.result_registered {
            risk.register_trade_result(trade.tp_touched);
            trade.result_registered = true;
        }

        info!(
            "EXIT {} {}: {} @ {:.5} -> {:.5} = {:+.1} pips ({})",
            ticket,
            reason,
            trade.direction,
            trade.entry_price,
            exit_price,
            profit_pips,
            if trade.tp_touched { "WIN" } else { "LOSS" }
        );

        Some(ClosedTrade {
            ticket,
            direction: trade.direction,
            entry_price: trade.entry_price,
            exit_price,
            profit_pips,
            exit_reason: reason,
            win: trade.tp_touched,
            candles_held: trade.candles_held,
            closed_at: tick.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::config::RiskConfig;
    use crate::execution::risk::RiskCounters;
    use crate::execution::simulated::SimulatedBroker;
    use anyhow::{bail, Result};
    use chrono::Utc;

    fn tick(bid: f64) -> Tick {
        Tick::new("EURUSD", bid, bid + 0.0001, Utc::now()).unwrap()
    }

    fn buy_signal() -> Signal {
        Signal::new(Direction::Buy, 1.1000, 1.0990, 1.1020, 1, Utc::now()).unwrap()
    }

    fn risk() -> RiskManager {
        RiskManager::new(RiskConfig::default(), PipScale::for_symbol("EURUSD"))
    }

    fn manager() -> TradeLifecycleManager {
        TradeLifecycleManager::new(LifecycleConfig::default(), "EURUSD")
    }

    /// Broker whose modify/close calls fail until `healthy` is set
    struct FlakyBroker {
        inner: SimulatedBroker,
        healthy: bool,
        quote: bool,
    }

    impl Broker for FlakyBroker {
        fn get_tick(&self, symbol: &str) -> Option<Tick> {
            if self.quote {
                self.inner.get_tick(symbol)
            } else {
                None
            }
        }
        fn place_market_order(&mut self, order: &MarketOrder) -> Result<Ticket> {
            self.inner.place_market_order(order)
        }
        fn modify_sl(&mut self, ticket: Ticket, new_sl: f64) -> Result<()> {
            if !self.healthy {
                bail!("terminal busy");
            }
            self.inner.modify_sl(ticket, new_sl)
        }
        fn position_exists(&self, ticket: Ticket) -> bool {
            self.inner.position_exists(ticket)
        }
        fn close_position(&mut self, ticket: Ticket) -> Result<()> {
            if !self.healthy {
                bail!("terminal busy");
            }
            self.inner.close_position(ticket)
        }
    }

    fn flaky() -> FlakyBroker {
        let mut inner = SimulatedBroker::new();
        inner.set_tick(tick(1.1000));
        FlakyBroker {
            inner,
            healthy: false,
            quote: true,
        }
    }

    #[test]
    fn test_open_failure_yields_none() {
        let mut broker = SimulatedBroker::new(); // no quote, order rejected
        let mut trades = manager();
        assert!(trades.open(&buy_signal(), &mut broker).is_none());
        assert_eq!(trades.active_count(), 0);
    }

    #[test]
    fn test_target_fill_counts_as_win() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        risk.register_trade_result(false);
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        let t = tick(1.1021);
        let closures = broker.sync(&t);
        let closed = trades.reconcile(&closures, &t, &mut risk);

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].ticket, ticket);
        assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
        assert!(closed[0].win);
        assert!((closed[0].profit_pips - 21.0).abs() < 1e-6);
        assert_eq!(risk.counters().consecutive_losses, 0);
        assert_eq!(trades.active_count(), 0);
    }

    #[test]
    fn test_stop_after_target_touch_is_still_win() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        // Target touched on a quote the broker's engine never saw
        broker.set_tick(tick(1.1020));
        assert!(trades.manage(&mut broker, &mut risk).is_empty());
        assert!(trades.trade(ticket).unwrap().tp_touched);

        // Reverses through the break-even stop
        let stop = tick(1.0989);
        let closures = broker.sync(&stop);
        let closed = trades.reconcile(&closures, &stop, &mut risk);
        assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
        assert!(closed[0].win);
        assert!(closed[0].profit_pips < 0.0);
        assert_eq!(risk.counters().consecutive_losses, 0);
    }

    #[test]
    fn test_stop_fill_is_loss() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        trades.open(&buy_signal(), &mut broker).unwrap();

        let t = tick(1.0989);
        let closures = broker.sync(&t);
        let closed = trades.reconcile(&closures, &t, &mut risk);
        assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
        assert!(!closed[0].win);
        assert_eq!(risk.counters().consecutive_losses, 1);
    }

    #[test]
    fn test_break_even_is_sticky() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        broker.set_tick(tick(1.1006));
        trades.manage(&mut broker, &mut risk);
        let trade = trades.trade(ticket).unwrap();
        assert!(trade.be_moved);
        assert_eq!(trade.sl, 1.1000);
        assert_eq!(broker.position(ticket).unwrap().sl, 1.1000);

        // Price falls back; flag stays set
        broker.set_tick(tick(1.1002));
        trades.manage(&mut broker, &mut risk);
        assert!(trades.trade(ticket).unwrap().be_moved);
    }

    #[test]
    fn test_break_even_failure_retried() {
        let mut broker = flaky();
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        broker.inner.set_tick(tick(1.1006));
        trades.manage(&mut broker, &mut risk);
        assert!(!trades.trade(ticket).unwrap().be_moved);

        broker.healthy = true;
        trades.manage(&mut broker, &mut risk);
        assert!(trades.trade(ticket).unwrap().be_moved);
    }

    #[test]
    fn test_time_stop_closes_once() {
        let mut broker = flaky();
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        for _ in 0..15 {
            trades.on_candle_closed();
        }
        // Close rejected: trade stays, nothing registered
        assert!(trades.manage(&mut broker, &mut risk).is_empty());
        assert_eq!(risk.counters().consecutive_losses, 0);

        broker.healthy = true;
        let closed = trades.manage(&mut broker, &mut risk);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].ticket, ticket);
        assert_eq!(closed[0].exit_reason, ExitReason::TimeStop);
        assert_eq!(closed[0].candles_held, 15);
        assert_eq!(risk.counters().consecutive_losses, 1);

        assert!(trades.manage(&mut broker, &mut risk).is_empty());
        assert_eq!(risk.counters().consecutive_losses, 1);
    }

    #[test]
    fn test_missing_tick_changes_nothing() {
        let mut broker = flaky();
        broker.healthy = true;
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();
        for _ in 0..20 {
            trades.on_candle_closed();
        }

        broker.quote = false;
        broker.inner.close_position(ticket).unwrap();
        assert!(trades.manage(&mut broker, &mut risk).is_empty());
        assert_eq!(trades.active_count(), 1);
        assert_eq!(risk.counters(), RiskCounters::default());
    }

    #[test]
    fn test_external_close_detected() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        let ticket = trades.open(&buy_signal(), &mut broker).unwrap();

        broker.close_position(ticket).unwrap();
        let closed = trades.manage(&mut broker, &mut risk);
        assert_eq!(closed[0].exit_reason, ExitReason::ClosedExternally);
        assert_eq!(risk.counters().consecutive_losses, 1);
    }

    #[test]
    fn test_close_all_end_of_data() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let mut trades = manager();
        let mut risk = risk();
        trades.open(&buy_signal(), &mut broker).unwrap();
        let sell = Signal::new(Direction::Sell, 1.1000, 1.1010, 1.0980, 2, Utc::now()).unwrap();
        trades.open(&sell, &mut broker).unwrap();

        let closed = trades.close_all(&tick(1.1005), ExitReason::EndOfData, &mut risk);
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|c| c.exit_reason == ExitReason::EndOfData));
        // Buy exits at bid, sell at ask
        assert!((closed[0].profit_pips - 5.0).abs() < 1e-6);
        assert!((closed[1].profit_pips + 6.0).abs() < 1e-6);
        assert_eq!(trades.active_count(), 0);
    }
}
