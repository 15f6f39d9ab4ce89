//! Risk sizing and trade gating
//!
//! Sizes stops and targets from the pullback extreme, decides when to move a stop to
//! break-even, and blocks new trades once the session cap or loss streak is reached.

use tracing::info;

use super::config::RiskConfig;
use crate::pips::PipScale;
use crate::types::Direction;

/// Session counters. Only `reset_session` clears them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskCounters {
    pub trades_this_session: u32,
    pub consecutive_losses: u32,
}

pub struct RiskManager {
    config: RiskConfig,
    scale: PipScale,
    counters: RiskCounters,
}

impl RiskManager {
    pub fn new(config: RiskConfig, scale: PipScale) -> Self {
        Self {
            config,
            scale,
            counters: RiskCounters::default(),
        }
    }

    pub fn counters(&self) -> RiskCounters {
        self.counters
    }

    /// Stop and target for an entry against the pullback extreme
    pub fn calculate_sl_tp(&self, direction: Direction, entry: f64, pb_extreme: f64) -> (f64, f64) {
        let sign = direction.sign();
        let cushion = self.scale.to_price(self.config.sl_cushion_pips);

        let mut sl = pb_extreme - sign * cushion;
        if self.scale.to_pips(sign * (entry - sl)) < self.config.min_risk_pips {
            sl = entry - sign * self.scale.to_price(self.config.fallback_sl_pips);
        }

        let risk = sign * (entry - sl);
        let tp = entry + sign * risk * self.config.reward_multiple;
        (sl, tp)
    }

    pub fn can_trade(&self) -> bool {
        self.counters.trades_this_session < self.config.max_trades_session
            && self.counters.consecutive_losses < self.config.max_consecutive_losses
    }

    /// True once unrealized profit reaches the break-even trigger
    pub fn should_move_to_be(&self, direction: Direction, entry: f64, current_price: f64) -> bool {
        let profit_pips = self.scale.to_pips(direction.sign() * (current_price - entry));
        profit_pips >= self.config.be_trigger_pips
    }

    pub fn register_new_trade(&mut self) {
        self.counters.trades_this_session += 1;
    }

    pub fn register_trade_result(&mut self, win: bool) {
        if win {
            self.counters.consecutive_losses = 0;
        } else {
            self.counters.consecutive_losses += 1;
        }
    }

    /// Session boundary: clear both counters
    pub fn reset_session(&mut self) {
        info!(
            "Risk session reset ({} trades, {} consecutive losses)",
            self.counters.trades_this_session, self.counters.consecutive_losses
        );
        self.counters = RiskCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk() -> RiskManager {
        RiskManager::new(RiskConfig::default(), PipScale::for_symbol("EURUSD"))
    }

    #[test]
    fn test_sl_tp_from_pullback() {
        let (sl, tp) = risk().calculate_sl_tp(Direction::Buy, 1.1010, 1.1005);
        assert!((sl - 1.10045).abs() < 1e-5);
        assert!((tp - 1.10166).abs() < 1e-5);
    }

    #[test]
    fn test_sl_fallback_when_risk_small() {
        // 1.8 pips of structural risk: falls back to 6.5 pips
        let (sl, tp) = risk().calculate_sl_tp(Direction::Buy, 1.10083, 1.1007);
        assert!((sl - 1.10018).abs() < 1e-9);
        assert!((tp - (1.10083 + 0.00065 * 1.2)).abs() < 1e-9);
    }

    #[test]
    fn test_sell_mirror() {
        let (sl, tp) = risk().calculate_sl_tp(Direction::Sell, 1.1000, 1.1005);
        assert!((sl - 1.10055).abs() < 1e-9);
        assert!((tp - (1.1000 - 0.00055 * 1.2)).abs() < 1e-9);
        assert!(tp < 1.1000 && 1.1000 < sl);
    }

    #[test]
    fn test_loss_streak_gate() {
        let mut risk = risk();
        assert!(risk.can_trade());
        for _ in 0..3 {
            risk.register_trade_result(false);
        }
        assert!(!risk.can_trade());
        risk.register_trade_result(true);
        assert!(risk.can_trade());
    }

    #[test]
    fn test_session_cap() {
        let mut risk = risk();
        for _ in 0..5 {
            risk.register_new_trade();
            risk.register_trade_result(true);
        }
        assert!(!risk.can_trade());
        risk.reset_session();
        assert!(risk.can_trade());
        assert_eq!(risk.counters(), RiskCounters::default());
    }

    #[test]
    fn test_break_even_threshold() {
        let risk = risk();
        assert!(!risk.should_move_to_be(Direction::Buy, 1.1000, 1.10049));
        assert!(risk.should_move_to_be(Direction::Buy, 1.1000, 1.10051));
        assert!(risk.should_move_to_be(Direction::Sell, 1.1000, 1.09949));
    }
}
