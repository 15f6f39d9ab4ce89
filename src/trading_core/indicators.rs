//! Incremental indicators over the candle stream
//!
//! EMA, EMA slope and average candle range are updated once per candle from bounded
//! history; nothing is recomputed over the full series.

use serde::{Deserialize, Serialize};

use super::ring::RingBuffer;
use crate::types::Candle;

/// Fewest EMA values needed before a (degraded) slope is reported
const MIN_SLOPE_VALUES: usize = 3;

/// Fewest candles needed before a (shortened) average range is reported
const MIN_RANGE_CANDLES: usize = 5;

/// Configuration for the indicator engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// EMA period (default: 20)
    pub ema_period: usize,
    /// Candles between the two EMA values differenced for the slope (default: 10)
    pub slope_lookback: usize,
    /// Candles averaged for the range filter (default: 20)
    pub range_lookback: usize,
    /// History retained (default: 100)
    pub history_capacity: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            slope_lookback: 10,
            range_lookback: 20,
            history_capacity: 100,
        }
    }
}

/// Indicator values after the latest candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema: f64,
    /// None until at least three EMA values exist
    pub ema_slope: Option<f64>,
    /// None until at least five candles exist
    pub avg_range: Option<f64>,
}

pub struct IndicatorEngine {
    alpha: f64,
    slope_lookback: usize,
    range_lookback: usize,
    ranges: RingBuffer<f64>,
    ema_values: RingBuffer<f64>,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        let period = config.ema_period.max(1);
        let slope_lookback = config.slope_lookback.max(1);
        let range_lookback = config.range_lookback.max(1);
        let capacity = config
            .history_capacity
            .max(slope_lookback + 1)
            .max(range_lookback);

        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            slope_lookback,
            range_lookback,
            ranges: RingBuffer::new(capacity),
            ema_values: RingBuffer::new(capacity),
        }
    }

    /// Fold a new candle in and return the updated snapshot
    pub fn update(&mut self, candle: &Candle) -> IndicatorSnapshot {
        self.ranges.push(candle.range());

        let ema = match self.ema_values.latest() {
            Some(prev) => self.alpha * candle.close + (1.0 - self.alpha) * prev,
            None => candle.close,
        };
        self.ema_values.push(ema);

        IndicatorSnapshot {
            ema,
            ema_slope: self.slope(ema),
            avg_range: self.avg_range(),
        }
    }

    fn slope(&self, ema: f64) -> Option<f64> {
        let available = self.ema_values.len();
        if available < MIN_SLOPE_VALUES {
            return None;
        }
        // Short history falls back to the longest lookback the buffer can serve
        let lookback = self.slope_lookback.min(available - 1);
        self.ema_values.back(lookback).map(|past| ema - past)
    }

    fn avg_range(&self) -> Option<f64> {
        let window = self.range_lookback.min(self.ranges.len());
        if window < MIN_RANGE_CANDLES.min(self.range_lookback) {
            return None;
        }
        let sum: f64 = self.ranges.last_n(window).sum();
        Some(sum / window as f64)
    }
}
