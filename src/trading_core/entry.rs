//! Breakout entry trigger
//!
//! The breakout level sits a small buffer beyond the pullback's trigger price. Candles fire
//! at the level itself; ticks fire at the live quote that crossed it.

use serde::{Deserialize, Serialize};

use crate::pips::PipScale;
use crate::types::{Candle, Direction, Tick};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Offset beyond the trigger price (default: 0.3 pips)
    pub buffer_pips: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self { buffer_pips: 0.3 }
    }
}

pub struct EntryTrigger {
    config: EntryConfig,
    scale: PipScale,
}

impl EntryTrigger {
    pub fn new(config: EntryConfig, scale: PipScale) -> Self {
        Self { config, scale }
    }

    pub fn breakout_level(&self, direction: Direction, trigger_price: f64) -> f64 {
        trigger_price + direction.sign() * self.scale.to_price(self.config.buffer_pips)
    }

    /// Entry price if the candle broke out
    pub fn check_candle(
        &self,
        direction: Direction,
        trigger_price: f64,
        candle: &Candle,
    ) -> Option<f64> {
        let level = self.breakout_level(direction, trigger_price);
        let fired = match direction {
            Direction::Buy => candle.high >= level,
            Direction::Sell => candle.low <= level,
        };
        fired.then_some(level)
    }

    /// Entry price if the live quote broke out (ask for Buy, bid for Sell)
    pub fn check_tick(&self, direction: Direction, trigger_price: f64, tick: &Tick) -> Option<f64> {
        let level = self.breakout_level(direction, trigger_price);
        let quote = tick.entry_price(direction);
        let fired = match direction {
            Direction::Buy => quote >= level,
            Direction::Sell => quote <= level,
        };
        fired.then_some(quote)
    }
}
