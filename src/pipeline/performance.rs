//! Performance report over closed trades
//!
//! All figures are in pips. A trade with profit > 0 is a win; everything else counts
//! as a loss for these statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::execution::position::ClosedTrade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PerformanceReport {
    NoTrades,
    Metrics {
        total_trades: usize,
        win_rate_pct: f64,
        /// +inf when there is no losing pip (serialized as null)
        profit_factor: f64,
        total_net_profit_pips: f64,
        max_drawdown_pips: f64,
        avg_win_pips: f64,
        avg_loss_pips: f64,
        expectancy_pips: f64,
    },
}

/// Largest drop from a running peak of a cumulative profit series. The peak starts
/// at zero, so an opening losing streak counts.
pub fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for &value in cumulative {
        peak = peak.max(value);
        worst = worst.max(peak - value);
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl PerformanceReport {
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        if trades.is_empty() {
            return Self::NoTrades;
        }

        let profits: Vec<f64> = trades.iter().map(|t| t.profit_pips).collect();
        let (wins, losses): (Vec<f64>, Vec<f64>) = profits.iter().copied().partition(|&p| p > 0.0);

        let total = profits.len();
        let win_rate = wins.len() as f64 / total as f64;
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss = losses.iter().sum::<f64>().abs();

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            f64::INFINITY
        };

        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);

        let cumulative: Vec<f64> = profits
            .iter()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();

        Self::Metrics {
            total_trades: total,
            win_rate_pct: win_rate * 100.0,
            profit_factor,
            total_net_profit_pips: profits.iter().sum(),
            max_drawdown_pips: max_drawdown(&cumulative),
            avg_win_pips: avg_win,
            avg_loss_pips: avg_loss,
            expectancy_pips: win_rate * avg_win + (1.0 - win_rate) * avg_loss,
        }
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        writeln!(f, "              BACKTEST PERFORMANCE REPORT")?;
        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        match self {
            Self::NoTrades => writeln!(f, "No trades executed")?,
            Self::Metrics {
                total_trades,
                win_rate_pct,
                profit_factor,
                total_net_profit_pips,
                max_drawdown_pips,
                avg_win_pips,
                avg_loss_pips,
                expectancy_pips,
            } => {
                writeln!(f, "Total Trades:      {}", total_trades)?;
                writeln!(f, "Win Rate:          {:.2}%", win_rate_pct)?;
                writeln!(f, "Profit Factor:     {:.2}", profit_factor)?;
                writeln!(f, "Total Net Profit:  {:+.2} pips", total_net_profit_pips)?;
                writeln!(f, "Max Drawdown:      {:.2} pips", max_drawdown_pips)?;
                writeln!(f, "Expectancy:        {:.2} pips/trade", expectancy_pips)?;
                writeln!(f, "Avg Win/Loss:      {:.2} / {:.2}", avg_win_pips, avg_loss_pips)?;
            }
        }
        write!(f, "═══════════════════════════════════════════════════════════")
    }
}
