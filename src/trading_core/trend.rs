//! Trend qualification
//!
//! A direction is in trend when price holds its side of the EMA, the EMA slope clears a
//! pip threshold, and (once enough history exists) recent structure makes a new extreme
//! against the earlier window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::indicators::IndicatorSnapshot;
use super::ring::RingBuffer;
use crate::pips::PipScale;
use crate::types::{Candle, Direction};

/// Configuration for trend qualification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum EMA slope in pips (default: 1.5)
    pub ema_slope_threshold_pips: f64,
    /// How far a close may pierce the EMA and still count (default: 0.5 pips)
    pub ema_pierce_buffer_pips: f64,
    /// Recent candles checked for a new extreme (default: 5)
    pub recent_window: usize,
    /// History length required before the structure check applies (default: 15)
    pub structure_window: usize,
    /// High/low history retained (default: 100)
    pub history_capacity: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            ema_slope_threshold_pips: 1.5,
            ema_pierce_buffer_pips: 0.5,
            recent_window: 5,
            structure_window: 15,
            history_capacity: 100,
        }
    }
}

pub struct TrendAnalyzer {
    config: TrendConfig,
    scale: PipScale,
    highs: RingBuffer<f64>,
    lows: RingBuffer<f64>,
    last_index: Option<u64>,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig, scale: PipScale) -> Self {
        let capacity = config.history_capacity.max(config.structure_window);
        Self {
            config,
            scale,
            highs: RingBuffer::new(capacity),
            lows: RingBuffer::new(capacity),
            last_index: None,
        }
    }

    /// Record the candle's extremes once per candle index
    fn record(&mut self, candle: &Candle) {
        if self.last_index == Some(candle.index) {
            return;
        }
        self.highs.push(candle.high);
        self.lows.push(candle.low);
        self.last_index = Some(candle.index);
    }

    pub fn qualify_uptrend(&mut self, candle: &Candle, indicators: &IndicatorSnapshot) -> bool {
        self.qualify(Direction::Buy, candle, indicators)
    }

    pub fn qualify_downtrend(&mut self, candle: &Candle, indicators: &IndicatorSnapshot) -> bool {
        self.qualify(Direction::Sell, candle, indicators)
    }

    /// Qualify a trend in `direction`. Records the candle before evaluating.
    pub fn qualify(
        &mut self,
        direction: Direction,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> bool {
        self.record(candle);

        let Some(slope) = indicators.ema_slope else {
            return false;
        };
        let ema = indicators.ema;
        let buffer = self.scale.to_price(self.config.ema_pierce_buffer_pips);
        let slope_pips = self.scale.to_pips(slope);
        let threshold = self.config.ema_slope_threshold_pips;

        let (ema_side_ok, slope_ok) = match direction {
            Direction::Buy => (candle.close >= ema - buffer, slope_pips >= threshold),
            Direction::Sell => (candle.close <= ema + buffer, slope_pips <= -threshold),
        };

        if !ema_side_ok {
            debug!(
                "Trend {}: close {:.5} on wrong side of EMA {:.5}",
                direction, candle.close, ema
            );
            return false;
        }
        if !slope_ok {
            debug!(
                "Trend {}: slope {:.2} pips below threshold {:.2}",
                direction, slope_pips, threshold
            );
            return false;
        }

        self.structure_confirms(direction)
    }

    fn structure_confirms(&self, direction: Direction) -> bool {
        let recent = self.config.recent_window;
        let full = self.config.structure_window;
        if self.highs.len() < full || recent == 0 || recent >= full {
            return true;
        }

        match direction {
            Direction::Buy => {
                let recent_high = max_of(self.highs.last_n(recent));
                let earlier_high = max_of(self.highs.window(full, recent));
                if recent_high <= earlier_high {
                    debug!(
                        "Trend BUY: no higher high ({:.5} <= {:.5})",
                        recent_high, earlier_high
                    );
                    return false;
                }
            }
            Direction::Sell => {
                let recent_low = min_of(self.lows.last_n(recent));
                let earlier_low = min_of(self.lows.window(full, recent));
                if recent_low >= earlier_low {
                    debug!(
                        "Trend SELL: no lower low ({:.5} >= {:.5})",
                        recent_low, earlier_low
                    );
                    return false;
                }
            }
        }
        true
    }
}

fn max_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(f64::INFINITY, f64::min)
}
