//! Configuration for risk sizing and trade management

use serde::{Deserialize, Serialize};

/// Stop/target sizing and session gating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Stop placed this far beyond the pullback extreme, in pips
    pub sl_cushion_pips: f64,

    /// Risk below this many pips falls back to a fixed stop
    pub min_risk_pips: f64,

    /// Fixed stop distance from entry used when risk is too small, in pips
    pub fallback_sl_pips: f64,

    /// Target distance as a multiple of risk
    pub reward_multiple: f64,

    /// Unrealized profit in pips that moves the stop to entry
    pub be_trigger_pips: f64,

    /// Max trades opened per session (trading stops when reached)
    pub max_trades_session: u32,

    /// Max losing trades in a row (trading stops until a win)
    pub max_consecutive_losses: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sl_cushion_pips: 0.5,
            min_risk_pips: 4.0,
            fallback_sl_pips: 6.5,
            reward_multiple: 1.2,
            be_trigger_pips: 5.0,
            max_trades_session: 5,
            max_consecutive_losses: 3,
        }
    }
}

/// Order placement and open-trade management
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Lots per market order
    pub volume: f64,

    /// Candles a trade may be held before it is force-closed
    pub time_stop_candles: u32,

    /// Comment attached to every order
    pub order_comment: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            volume: 0.1,
            time_stop_candles: 15,
            order_comment: "pullback-scalper".to_string(),
        }
    }
}
