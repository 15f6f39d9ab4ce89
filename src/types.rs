//! Market records shared across the engine: ticks, candles, direction and tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;

/// Trade direction. Used for impulses, setups, signals, trades and exit pricing alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1.0 for Buy, -1.0 for Sell
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Opaque position identifier handed out by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single bid/ask quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub spread: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    /// Build a validated tick. The spread is always derived as `ask - bid`.
    pub fn new(
        symbol: impl Into<String>,
        bid: f64,
        ask: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MarketDataError> {
        let symbol = symbol.into();
        if !bid.is_finite() || !ask.is_finite() {
            return Err(MarketDataError::NonFinitePrice { symbol, bid, ask });
        }
        if ask < bid {
            return Err(MarketDataError::CrossedQuote { symbol, bid, ask });
        }
        Ok(Self {
            symbol,
            bid,
            ask,
            spread: ask - bid,
            timestamp,
        })
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Price at which a position of `direction` would be closed right now
    pub fn exit_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.bid,
            Direction::Sell => self.ask,
        }
    }

    /// Price at which a new position of `direction` would be filled right now
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.ask,
            Direction::Sell => self.bid,
        }
    }
}

/// Fixed tick-count candle built from mid prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_count: u32,
    pub index: u64,
    pub timestamp_open: DateTime<Utc>,
    pub timestamp_close: DateTime<Utc>,
}

impl Candle {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Whether the candle closed in `direction` (doji candles count for neither side)
    pub fn closes_toward(&self, direction: Direction) -> bool {
        match direction {
            Direction::Buy => self.is_bullish(),
            Direction::Sell => self.is_bearish(),
        }
    }
}
