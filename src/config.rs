//! Top-level configuration
//!
//! Every section carries its own defaults, so a JSON file only needs the fields it
//! overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::execution::config::{LifecycleConfig, RiskConfig};
use crate::trading_core::candles::CandleConfig;
use crate::trading_core::indicators::IndicatorConfig;
use crate::trading_core::session::SessionConfig;
use crate::trading_core::state_machine::StrategyConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalperConfig {
    /// Symbol to trade (e.g., "EURUSD", "USDJPY", "XAUUSD")
    pub symbol: String,

    /// Widest spread at which the tick-level trigger may fire, in pips
    pub max_spread_pips: f64,

    pub candles: CandleConfig,
    pub indicators: IndicatorConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
    pub session: SessionConfig,
}

impl Default for ScalperConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            max_spread_pips: 3.0,
            candles: CandleConfig::default(),
            indicators: IndicatorConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            lifecycle: LifecycleConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ScalperConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse config JSON")
    }
}

/// Load a JSON config file
pub fn load_config(path: &Path) -> Result<ScalperConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    ScalperConfig::from_json(&raw).with_context(|| format!("in {}", path.display()))
}
