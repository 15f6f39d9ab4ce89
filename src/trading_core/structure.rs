//! Structure invalidation while a setup waits for its breakout

use serde::{Deserialize, Serialize};

use crate::pips::PipScale;
use crate::types::{Candle, Direction};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Allowed breach of the invalidation price (default: 0.5 pips)
    pub tolerance_pips: f64,
    /// Allowed close on the wrong side of the EMA (default: 1.0 pips)
    pub ema_buffer_pips: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            tolerance_pips: 0.5,
            ema_buffer_pips: 1.0,
        }
    }
}

/// Why a waiting setup was invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureBreak {
    /// Price ran through the pullback extreme
    ExtremeBreached,
    /// Close crossed the EMA against the trade
    EmaLost,
}

pub struct StructureMonitor {
    config: StructureConfig,
    scale: PipScale,
}

impl StructureMonitor {
    pub fn new(config: StructureConfig, scale: PipScale) -> Self {
        Self { config, scale }
    }

    /// Returns the break, if the candle invalidates a setup in `direction`
    pub fn check(
        &self,
        direction: Direction,
        candle: &Candle,
        invalidation_price: f64,
        ema: f64,
    ) -> Option<StructureBreak> {
        let tolerance = self.scale.to_price(self.config.tolerance_pips);
        let ema_buffer = self.scale.to_price(self.config.ema_buffer_pips);

        let (breached, ema_lost) = match direction {
            Direction::Buy => (
                candle.low < invalidation_price - tolerance,
                candle.close < ema - ema_buffer,
            ),
            Direction::Sell => (
                candle.high > invalidation_price + tolerance,
                candle.close > ema + ema_buffer,
            ),
        };

        if breached {
            Some(StructureBreak::ExtremeBreached)
        } else if ema_lost {
            Some(StructureBreak::EmaLost)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        let now = Utc::now();
        Candle {
            open: close,
            high,
            low,
            close,
            tick_count: 70,
            index: 0,
            timestamp_open: now,
            timestamp_close: now,
        }
    }

    fn monitor() -> StructureMonitor {
        StructureMonitor::new(StructureConfig::default(), PipScale::for_symbol("EURUSD"))
    }

    #[test]
    fn test_buy_holds_within_tolerance() {
        let c = candle(1.1010, 1.10067, 1.1008);
        assert_eq!(monitor().check(Direction::Buy, &c, 1.1007, 1.1006), None);
    }

    #[test]
    fn test_buy_breach() {
        let c = candle(1.1010, 1.1005, 1.1008);
        assert_eq!(
            monitor().check(Direction::Buy, &c, 1.1007, 1.1006),
            Some(StructureBreak::ExtremeBreached)
        );
    }

    #[test]
    fn test_buy_ema_lost() {
        let c = candle(1.1010, 1.1007, 1.1007);
        assert_eq!(
            monitor().check(Direction::Buy, &c, 1.1007, 1.1010),
            Some(StructureBreak::EmaLost)
        );
    }

    #[test]
    fn test_sell_mirror() {
        let m = monitor();
        let ok = candle(1.10043, 1.1000, 1.1002);
        assert_eq!(m.check(Direction::Sell, &ok, 1.1004, 1.1005), None);
        let breach = candle(1.1006, 1.1000, 1.1002);
        assert_eq!(
            m.check(Direction::Sell, &breach, 1.1004, 1.1005),
            Some(StructureBreak::ExtremeBreached)
        );
    }
}
