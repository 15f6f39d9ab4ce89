use thiserror::Error;

use crate::types::Direction;

/// Rejected market data at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("non-finite price in tick for {symbol}: bid={bid} ask={ask}")]
    NonFinitePrice { symbol: String, bid: f64, ask: f64 },

    #[error("crossed quote for {symbol}: ask {ask} below bid {bid}")]
    CrossedQuote { symbol: String, bid: f64, ask: f64 },

    #[error("tick for {symbol} has neither bid nor price and no fallback bid is configured")]
    MissingPrice { symbol: String },

    #[error("ticks per candle must be at least 1")]
    ZeroTicksPerCandle,
}

/// Signal whose stop/target do not bracket the entry on the correct sides.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("{direction} signal requires sl < entry < tp (sl={sl} entry={entry} tp={tp})")]
    InvalidBuyGeometry {
        direction: Direction,
        entry: f64,
        sl: f64,
        tp: f64,
    },

    #[error("{direction} signal requires tp < entry < sl (sl={sl} entry={entry} tp={tp})")]
    InvalidSellGeometry {
        direction: Direction,
        entry: f64,
        sl: f64,
        tp: f64,
    },
}

/// Session gate configuration that cannot be turned into a gate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("unknown time zone '{0}'")]
    UnknownTimezone(String),

    #[error("session window {start}-{end} ends before it starts")]
    InvertedWindow {
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    },
}
