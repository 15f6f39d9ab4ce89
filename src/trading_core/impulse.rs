//! Impulse leg detection for the pullback strategy
//!
//! Scans the most recent candles for a short, strong directional run. Windows are tried
//! from the shortest allowed length upward and the first one that qualifies wins.

use serde::{Deserialize, Serialize};

use crate::pips::PipScale;
use crate::types::{Candle, Direction};

/// Configuration for impulse detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Minimum net move from first open to last close, in pips (default: 8.0)
    pub min_size_pips: f64,
    /// Shortest window scanned (default: 5)
    pub min_candles: usize,
    /// Longest window scanned (default: 15)
    pub max_candles: usize,
    /// Summed bodies over window range (default: 0.6)
    pub min_body_dominance: f64,
    /// Share of summed ranges that overlaps (default: 0.3)
    pub max_overlap: f64,
    /// Share of candles closing in the impulse direction (default: 0.6)
    pub min_directional_ratio: f64,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            min_size_pips: 8.0,
            min_candles: 5,
            max_candles: 15,
            min_body_dominance: 0.6,
            max_overlap: 0.3,
            min_directional_ratio: 0.6,
        }
    }
}

/// Detected impulse leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseLeg {
    pub direction: Direction,
    /// Net move in pips (always positive)
    pub size_pips: f64,
    pub high: f64,
    pub low: f64,
    pub candle_count: usize,
    pub avg_body: f64,
}

impl ImpulseLeg {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

pub struct ImpulseDetector {
    config: ImpulseConfig,
    scale: PipScale,
}

impl ImpulseDetector {
    pub fn new(config: ImpulseConfig, scale: PipScale) -> Self {
        Self { config, scale }
    }

    /// Detect an impulse ending at the latest candle. `candles` is ordered oldest first.
    pub fn detect(&self, candles: &[Candle]) -> Option<ImpulseLeg> {
        let min_n = self.config.min_candles.max(1);
        let max_n = self.config.max_candles.min(candles.len());
        if max_n < min_n {
            return None;
        }

        (min_n..=max_n).find_map(|n| self.evaluate(&candles[candles.len() - n..]))
    }

    fn evaluate(&self, leg: &[Candle]) -> Option<ImpulseLeg> {
        let first = leg.first()?;
        let last = leg.last()?;
        let n = leg.len();

        let size_pips = self.scale.to_pips(last.close - first.open).abs();
        if size_pips < self.config.min_size_pips {
            return None;
        }

        let high = leg.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = leg.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let total_range = high - low;
        if total_range <= 0.0 {
            return None;
        }

        let sum_bodies: f64 = leg.iter().map(Candle::body).sum();
        if sum_bodies / total_range < self.config.min_body_dominance {
            return None;
        }

        let sum_ranges: f64 = leg.iter().map(Candle::range).sum();
        if sum_ranges <= 0.0 {
            return None;
        }
        let overlap = (sum_ranges - total_range) / sum_ranges;
        if overlap > self.config.max_overlap {
            return None;
        }

        let direction = if last.close > first.open {
            Direction::Buy
        } else {
            Direction::Sell
        };

        // Directional closes
        let matching = leg.iter().filter(|c| c.closes_toward(direction)).count();
        if (matching as f64) < n as f64 * self.config.min_directional_ratio {
            return None;
        }

        Some(ImpulseLeg {
            direction,
            size_pips,
            high,
            low,
            candle_count: n,
            avg_body: sum_bodies / n as f64,
        })
    }
}
