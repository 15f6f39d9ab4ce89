//! Pullback qualification against a detected impulse leg

use serde::{Deserialize, Serialize};

use super::impulse::ImpulseLeg;
use super::indicators::IndicatorSnapshot;
use crate::pips::PipScale;
use crate::types::{Candle, Direction};

/// Configuration for pullback qualification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackConfig {
    /// Fewest pullback candles (default: 2)
    pub min_candles: usize,
    /// Most pullback candles (default: 5)
    pub max_candles: usize,
    /// Minimum retracement as a fraction of the impulse range (default: 0.3)
    pub min_depth: f64,
    /// Maximum retracement as a fraction of the impulse range (default: 0.6)
    pub max_depth: f64,
    /// Distance from the EMA that still counts as a touch (default: 1.5 pips)
    pub ema_buffer_pips: f64,
    /// How far a pullback wick may overshoot the impulse extreme (default: 0.5 pips)
    pub wick_tolerance_pips: f64,
    /// How far a pullback close may sit beyond the impulse extreme (default: 0.1 pips)
    pub close_buffer_pips: f64,
    /// Average pullback body over impulse average body must stay below this (default: 0.7)
    pub max_body_ratio: f64,
}

impl Default for PullbackConfig {
    fn default() -> Self {
        Self {
            min_candles: 2,
            max_candles: 5,
            min_depth: 0.3,
            max_depth: 0.6,
            ema_buffer_pips: 1.5,
            wick_tolerance_pips: 0.5,
            close_buffer_pips: 0.1,
            max_body_ratio: 0.7,
        }
    }
}

/// Outcome of a pullback check. Failures name the first check that did not pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PullbackVerdict {
    Qualified { depth: f64 },
    CandleCount(usize),
    ZeroImpulseRange,
    WickOvershoot { extreme: f64 },
    CloseBeyondImpulse { close: f64 },
    DepthOutOfRange(f64),
    AwayFromEma,
    BodiesTooLarge { avg_body: f64 },
}

impl PullbackVerdict {
    pub fn is_qualified(&self) -> bool {
        matches!(self, PullbackVerdict::Qualified { .. })
    }
}

impl std::fmt::Display for PullbackVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullbackVerdict::Qualified { depth } => write!(f, "qualified (depth {:.3})", depth),
            PullbackVerdict::CandleCount(n) => write!(f, "candle count {} out of range", n),
            PullbackVerdict::ZeroImpulseRange => write!(f, "impulse range is zero"),
            PullbackVerdict::WickOvershoot { extreme } => {
                write!(f, "wick {:.5} overshoots impulse extreme", extreme)
            }
            PullbackVerdict::CloseBeyondImpulse { close } => {
                write!(f, "close {:.5} beyond impulse extreme", close)
            }
            PullbackVerdict::DepthOutOfRange(depth) => write!(f, "depth {:.3} out of range", depth),
            PullbackVerdict::AwayFromEma => write!(f, "no candle near EMA"),
            PullbackVerdict::BodiesTooLarge { avg_body } => {
                write!(f, "average body {:.5} too large", avg_body)
            }
        }
    }
}

pub struct PullbackQualifier {
    config: PullbackConfig,
    scale: PipScale,
}

impl PullbackQualifier {
    pub fn new(config: PullbackConfig, scale: PipScale) -> Self {
        Self { config, scale }
    }

    pub fn max_candles(&self) -> usize {
        self.config.max_candles
    }

    pub fn qualify(
        &self,
        pb_candles: &[Candle],
        impulse: &ImpulseLeg,
        indicators: &IndicatorSnapshot,
    ) -> PullbackVerdict {
        let n = pb_candles.len();
        if n == 0 || n < self.config.min_candles || n > self.config.max_candles {
            return PullbackVerdict::CandleCount(n);
        }

        let range = impulse.range();
        if range <= 0.0 {
            return PullbackVerdict::ZeroImpulseRange;
        }

        let pb_high = pb_candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let pb_low = pb_candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let wick_tolerance = self.scale.to_price(self.config.wick_tolerance_pips);
        let close_buffer = self.scale.to_price(self.config.close_buffer_pips);

        let depth = match impulse.direction {
            Direction::Buy => {
                if pb_high > impulse.high + wick_tolerance {
                    return PullbackVerdict::WickOvershoot { extreme: pb_high };
                }
                let limit = impulse.high + close_buffer;
                if let Some(c) = pb_candles.iter().find(|c| c.close > limit) {
                    return PullbackVerdict::CloseBeyondImpulse { close: c.close };
                }
                (impulse.high - pb_low) / range
            }
            Direction::Sell => {
                if pb_low < impulse.low - wick_tolerance {
                    return PullbackVerdict::WickOvershoot { extreme: pb_low };
                }
                let limit = impulse.low - close_buffer;
                if let Some(c) = pb_candles.iter().find(|c| c.close < limit) {
                    return PullbackVerdict::CloseBeyondImpulse { close: c.close };
                }
                (pb_high - impulse.low) / range
            }
        };

        if depth < self.config.min_depth || depth > self.config.max_depth {
            return PullbackVerdict::DepthOutOfRange(depth);
        }

        if !self.near_ema(pb_candles, indicators.ema) {
            return PullbackVerdict::AwayFromEma;
        }

        let avg_body = pb_candles.iter().map(Candle::body).sum::<f64>() / n as f64;
        if avg_body >= self.config.max_body_ratio * impulse.avg_body {
            return PullbackVerdict::BodiesTooLarge { avg_body };
        }

        PullbackVerdict::Qualified { depth }
    }

    fn near_ema(&self, pb_candles: &[Candle], ema: f64) -> bool {
        pb_candles.iter().any(|c| {
            if c.low <= ema && ema <= c.high {
                return true;
            }
            let dist = (c.low - ema).abs().min((c.high - ema).abs());
            self.scale.to_pips(dist) <= self.config.ema_buffer_pips
        })
    }
}
