//! Tick-count candle aggregation
//!
//! Every candle closes after a fixed number of ticks, independent of wall-clock time,
//! so replayed and live feeds produce the same candles from the same ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;
use crate::types::{Candle, Tick};

/// Configuration for tick aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleConfig {
    /// Ticks folded into one candle (default: 70)
    pub ticks_per_candle: u32,
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            ticks_per_candle: 70,
        }
    }
}

struct CandleBuilder {
    timestamp_open: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    tick_count: u32,
}

impl CandleBuilder {
    fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp_open: timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 1,
        }
    }

    fn add(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.tick_count += 1;
    }

    fn finish(self, index: u64, timestamp_close: DateTime<Utc>) -> Candle {
        Candle {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            tick_count: self.tick_count,
            index,
            timestamp_open: self.timestamp_open,
            timestamp_close,
        }
    }
}

/// Folds mid prices into fixed tick-count candles
pub struct TickAggregator {
    ticks_per_candle: u32,
    current: Option<CandleBuilder>,
    next_index: u64,
}

impl TickAggregator {
    pub fn new(config: &CandleConfig) -> Result<Self, MarketDataError> {
        if config.ticks_per_candle == 0 {
            return Err(MarketDataError::ZeroTicksPerCandle);
        }
        Ok(Self {
            ticks_per_candle: config.ticks_per_candle,
            current: None,
            next_index: 0,
        })
    }

    /// Process a tick and return the candle it completes, if any
    pub fn process(&mut self, tick: &Tick) -> Option<Candle> {
        let mid = tick.mid();

        match &mut self.current {
            Some(builder) => builder.add(mid),
            None => self.current = Some(CandleBuilder::new(tick.timestamp, mid)),
        }

        let full = self
            .current
            .as_ref()
            .is_some_and(|b| b.tick_count >= self.ticks_per_candle);
        if !full {
            return None;
        }

        let builder = self.current.take()?;
        let candle = builder.finish(self.next_index, tick.timestamp);
        self.next_index += 1;
        Some(candle)
    }

    /// Ticks accumulated into the candle currently being built
    pub fn pending_ticks(&self) -> u32 {
        self.current.as_ref().map_or(0, |b| b.tick_count)
    }

    /// Index the next emitted candle will carry
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
