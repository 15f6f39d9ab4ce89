//! Pip conversion.
//!
//! One pip is 0.0001 for most FX pairs, 0.01 for JPY pairs and 0.1 for gold.

use serde::{Deserialize, Serialize};

pub fn pip_size(symbol: &str) -> f64 {
    if symbol.contains("JPY") {
        0.01
    } else if symbol.contains("XAU") {
        0.1
    } else {
        0.0001
    }
}

pub fn price_to_pips(price_diff: f64, symbol: &str) -> f64 {
    price_diff / pip_size(symbol)
}

pub fn pips_to_price(pips: f64, symbol: &str) -> f64 {
    pips * pip_size(symbol)
}

/// Pip size resolved once for the traded symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipScale {
    pip: f64,
}

impl PipScale {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            pip: pip_size(symbol),
        }
    }

    pub fn pip(&self) -> f64 {
        self.pip
    }

    pub fn to_pips(&self, price_diff: f64) -> f64 {
        price_diff / self.pip
    }

    pub fn to_price(&self, pips: f64) -> f64 {
        pips * self.pip
    }
}

impl Default for PipScale {
    fn default() -> Self {
        Self::for_symbol("EURUSD")
    }
}
