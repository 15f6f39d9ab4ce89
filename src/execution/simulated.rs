//! Simulated broker for replay
//!
//! Fills market orders at the current quote (ask for Buy, bid for Sell) and closes
//! positions when the quote reaches their stop or target.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use tracing::debug;

use super::broker::{Broker, ExitReason, MarketOrder};
use crate::types::{Direction, Tick, Ticket};

const FIRST_TICKET: u64 = 1000;

/// An open simulated position
#[derive(Debug, Clone, PartialEq)]
pub struct SimPosition {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub sl: f64,
    pub tp: f64,
    pub fill_price: f64,
}

pub struct SimulatedBroker {
    current_tick: Option<Tick>,
    positions: BTreeMap<Ticket, SimPosition>,
    next_ticket: u64,
}

impl Default for SimulatedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBroker {
    pub fn new() -> Self {
        Self {
            current_tick: None,
            positions: BTreeMap::new(),
            next_ticket: FIRST_TICKET,
        }
    }

    pub fn set_tick(&mut self, tick: Tick) {
        self.current_tick = Some(tick);
    }

    pub fn position(&self, ticket: Ticket) -> Option<&SimPosition> {
        self.positions.get(&ticket)
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Close every position whose stop or target the current quote has reached.
    /// The stop is checked before the target.
    pub fn check_sl_tp(&mut self) -> Vec<(Ticket, ExitReason)> {
        let Some(tick) = &self.current_tick else {
            return Vec::new();
        };

        let closed: Vec<(Ticket, ExitReason)> = self
            .positions
            .iter()
            .filter_map(|(&ticket, pos)| {
                let reason = match pos.direction {
                    Direction::Buy if tick.bid <= pos.sl => ExitReason::StopLoss,
                    Direction::Buy if tick.bid >= pos.tp => ExitReason::TakeProfit,
                    Direction::Sell if tick.ask >= pos.sl => ExitReason::StopLoss,
                    Direction::Sell if tick.ask <= pos.tp => ExitReason::TakeProfit,
                    _ => return None,
                };
                Some((ticket, reason))
            })
            .collect();

        for (ticket, reason) in &closed {
            debug!("Simulated {} hit for {}", reason, ticket);
            self.positions.remove(ticket);
        }
        closed
    }
}

impl Broker for SimulatedBroker {
    fn get_tick(&self, symbol: &str) -> Option<Tick> {
        self.current_tick
            .as_ref()
            .filter(|t| t.symbol == symbol)
            .cloned()
    }

    fn place_market_order(&mut self, order: &MarketOrder) -> Result<Ticket> {
        let tick = self
            .current_tick
            .as_ref()
            .ok_or_else(|| anyhow!("no quote available to fill {} order", order.direction))?;
        if order.volume <= 0.0 {
            bail!("invalid order volume {}", order.volume);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.positions.insert(
            ticket,
            SimPosition {
                symbol: order.symbol.clone(),
                direction: order.direction,
                volume: order.volume,
                sl: order.sl,
                tp: order.tp,
                fill_price: tick.entry_price(order.direction),
            },
        );
        Ok(ticket)
    }

    fn modify_sl(&mut self, ticket: Ticket, new_sl: f64) -> Result<()> {
        let pos = self
            .positions
            .get_mut(&ticket)
            .ok_or_else(|| anyhow!("position {} not found", ticket))?;
        pos.sl = new_sl;
        Ok(())
    }

    fn position_exists(&self, ticket: Ticket) -> bool {
        self.positions.contains_key(&ticket)
    }

    fn close_position(&mut self, ticket: Ticket) -> Result<()> {
        self.positions
            .remove(&ticket)
            .map(|_| ())
            .ok_or_else(|| anyhow!("position {} not found", ticket))
    }

    fn sync(&mut self, tick: &Tick) -> Vec<(Ticket, ExitReason)> {
        self.set_tick(tick.clone());
        self.check_sl_tp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tick(bid: f64) -> Tick {
        Tick::new("EURUSD", bid, bid + 0.0001, Utc::now()).unwrap()
    }

    fn order(direction: Direction, sl: f64, tp: f64) -> MarketOrder {
        MarketOrder {
            symbol: "EURUSD".to_string(),
            direction,
            volume: 0.1,
            sl,
            tp,
            comment: "test".to_string(),
        }
    }

    #[test]
    fn test_fill_and_ticket_sequence() {
        let mut broker = SimulatedBroker::new();
        assert!(broker
            .place_market_order(&order(Direction::Buy, 1.0990, 1.1020))
            .is_err());

        broker.set_tick(tick(1.1000));
        let first = broker
            .place_market_order(&order(Direction::Buy, 1.0990, 1.1020))
            .unwrap();
        let second = broker
            .place_market_order(&order(Direction::Sell, 1.1010, 1.0980))
            .unwrap();
        assert_eq!(first, Ticket(1000));
        assert_eq!(second, Ticket(1001));
        assert!((broker.position(first).unwrap().fill_price - 1.1001).abs() < 1e-12);
        assert_eq!(broker.position(second).unwrap().fill_price, 1.1000);
    }

    #[test]
    fn test_sync_closes_on_stop_and_target() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let buy = broker
            .place_market_order(&order(Direction::Buy, 1.0990, 1.1020))
            .unwrap();
        let sell = broker
            .place_market_order(&order(Direction::Sell, 1.1030, 1.0980))
            .unwrap();

        assert!(broker.sync(&tick(1.1010)).is_empty());

        let closed = broker.sync(&tick(1.1021));
        assert_eq!(closed, vec![(buy, ExitReason::TakeProfit)]);
        assert!(!broker.position_exists(buy));

        // ask 1.1031 >= sl 1.1030
        let closed = broker.sync(&tick(1.1030));
        assert_eq!(closed, vec![(sell, ExitReason::StopLoss)]);
        assert_eq!(broker.open_positions(), 0);
    }

    #[test]
    fn test_modify_and_close() {
        let mut broker = SimulatedBroker::new();
        broker.set_tick(tick(1.1000));
        let t = broker
            .place_market_order(&order(Direction::Buy, 1.0990, 1.1020))
            .unwrap();
        broker.modify_sl(t, 1.1001).unwrap();
        assert_eq!(broker.position(t).unwrap().sl, 1.1001);

        broker.close_position(t).unwrap();
        assert!(broker.close_position(t).is_err());
        assert!(broker.modify_sl(t, 1.0).is_err());
    }

    #[test]
    fn test_get_tick_filters_symbol() {
        let mut broker = SimulatedBroker::new();
        assert!(broker.get_tick("EURUSD").is_none());
        broker.set_tick(tick(1.1));
        assert!(broker.get_tick("EURUSD").is_some());
        assert!(broker.get_tick("USDJPY").is_none());
    }
}
