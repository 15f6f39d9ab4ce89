//! Execution collaborator
//!
//! The `Broker` trait abstracts over where orders go (the simulated book for replay, a
//! terminal bridge when live) so the trader never branches on the backend.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::{Direction, Tick, Ticket};

/// Market order request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub sl: f64,
    pub tp: f64,
    pub comment: String,
}

/// Why a trade left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeStop,
    ClosedExternally,
    EndOfData,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "SL"),
            ExitReason::TakeProfit => write!(f, "TP"),
            ExitReason::TimeStop => write!(f, "TIME_STOP"),
            ExitReason::ClosedExternally => write!(f, "EXTERNAL"),
            ExitReason::EndOfData => write!(f, "END_OF_DATA"),
        }
    }
}

pub trait Broker {
    /// Latest quote for `symbol`, if one is available
    fn get_tick(&self, symbol: &str) -> Option<Tick>;

    fn place_market_order(&mut self, order: &MarketOrder) -> Result<Ticket>;

    fn modify_sl(&mut self, ticket: Ticket, new_sl: f64) -> Result<()>;

    fn position_exists(&self, ticket: Ticket) -> bool;

    fn close_position(&mut self, ticket: Ticket) -> Result<()>;

    /// Feed a tick to the broker and collect positions its own stop/target engine closed.
    /// Live bridges close positions out of band and keep the default.
    fn sync(&mut self, _tick: &Tick) -> Vec<(Ticket, ExitReason)> {
        Vec::new()
    }
}
