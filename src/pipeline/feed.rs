//! Tick sources for replay
//!
//! - CSV files with loosely-specified columns, normalized into validated ticks
//! - Synthetic ticks: a scripted impulse/pullback/breakout, then a seeded random walk

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::MarketDataError;
use crate::pips::PipScale;
use crate::types::Tick;

/// Spread assumed when a record has neither a spread nor both sides of the quote
const DEFAULT_SPREAD_PIPS: f64 = 0.5;

/// One CSV row; every column except the timestamp is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTick {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    /// Generic last/mid price used when bid is absent
    #[serde(default, alias = "last")]
    pub price: Option<f64>,
    #[serde(default)]
    pub spread: Option<f64>,
    #[serde(alias = "time")]
    pub timestamp: String,
}

/// Fills in missing quote fields before a tick is validated
#[derive(Debug, Clone)]
pub struct TickNormalizer {
    symbol: String,
    scale: PipScale,
    fallback_bid: Option<f64>,
}

impl TickNormalizer {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            scale: PipScale::for_symbol(symbol),
            fallback_bid: None,
        }
    }

    /// Bid used when a record carries no price at all
    pub fn with_fallback_bid(mut self, bid: f64) -> Self {
        self.fallback_bid = Some(bid);
        self
    }

    pub fn normalize(&self, raw: &RawTick, timestamp: DateTime<Utc>) -> Result<Tick, MarketDataError> {
        let symbol = raw.symbol.clone().unwrap_or_else(|| self.symbol.clone());

        let spread = match (raw.spread, raw.bid, raw.ask) {
            (Some(s), _, _) if s > 0.0 => s,
            (_, Some(bid), Some(ask)) => ask - bid,
            _ => self.scale.to_price(DEFAULT_SPREAD_PIPS),
        };

        let bid = raw
            .bid
            .or(raw.price)
            .or(self.fallback_bid)
            .ok_or_else(|| MarketDataError::MissingPrice {
                symbol: symbol.clone(),
            })?;
        let ask = raw.ask.unwrap_or(bid + spread);

        Tick::new(symbol, bid, ask, timestamp)
    }
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD HH:MM:SS[.fff]` taken as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .with_context(|| format!("Failed to parse timestamp: {}", raw))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Load and normalize every row of a tick CSV
pub fn load_csv(path: &Path, normalizer: &TickNormalizer) -> Result<Vec<Tick>> {
    info!("Loading ticks from {:?}...", path);
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let mut ticks = Vec::new();
    for (row, result) in reader.deserialize::<RawTick>().enumerate() {
        let raw = result.with_context(|| format!("Failed to parse CSV row {}", row + 1))?;
        let timestamp = parse_timestamp(&raw.timestamp).with_context(|| format!("row {}", row + 1))?;
        let tick = normalizer
            .normalize(&raw, timestamp)
            .with_context(|| format!("row {}", row + 1))?;
        ticks.push(tick);
    }

    info!("Loaded {} ticks", ticks.len());
    Ok(ticks)
}

/// Parameters for the synthetic tick generator
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub symbol: String,
    pub days: u32,
    pub seed: u64,
    pub start_price: f64,
    pub start: DateTime<Utc>,
    pub ticks_per_day: usize,
    pub tick_interval_ms: i64,
    /// Ticks per scripted candle; match the replay's candle size (default: 70)
    pub ticks_per_candle: u32,
    /// Fixed spread of the scripted section (default: 0.6)
    pub scripted_spread_pips: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            days: 1,
            seed: 42,
            start_price: 1.1000,
            start: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap_or_default(),
            ticks_per_day: 30_000,
            tick_interval_ms: 500,
            ticks_per_candle: 70,
            scripted_spread_pips: 0.6,
        }
    }
}

/// Scripted candles as (high, low, close) offsets in pips from each candle's open
fn scripted_candles() -> Vec<(f64, f64, f64)> {
    let mut shapes = Vec::with_capacity(35);
    // Choppy climb so the EMA slope and average range warm up without an impulse
    for i in 0..24 {
        shapes.push(if i % 2 == 0 {
            (1.1, -0.1, 1.0)
        } else {
            (0.1, -0.6, -0.5)
        });
    }
    // Impulse
    shapes.extend([(2.2, -0.1, 2.0); 4]);
    // Pullback into the EMA
    shapes.extend([(0.2, -2.0, -1.2), (0.4, -2.0, -0.8), (0.3, -2.8, -0.4)]);
    // Breakout and follow-through
    shapes.extend([(3.2, -0.2, 3.0); 4]);
    shapes
}

/// Deterministic bullish impulse, pullback and breakout that runs to its target under
/// the default strategy settings. Each candle is `ticks_per_candle` ticks walking
/// open, low, high, close (open, high, low, close for bearish candles).
pub fn scripted_ticks(config: &SyntheticConfig) -> Result<Vec<Tick>> {
    ensure!(
        config.ticks_per_candle >= 2,
        "scripted candles need at least 2 ticks, got {}",
        config.ticks_per_candle
    );
    let scale = PipScale::for_symbol(&config.symbol);
    let spread = scale.to_price(config.scripted_spread_pips);
    let n = config.ticks_per_candle;

    let shapes = scripted_candles();
    let mut ticks = Vec::with_capacity(shapes.len() * n as usize);
    let mut open = 0.0_f64;

    for (high, low, close) in shapes {
        let (high, low, close) = (open + high, open + low, open + close);
        let path = if close >= open {
            [open, low, high, close]
        } else {
            [open, high, low, close]
        };

        for k in 0..n {
            let x = k as f64 * 3.0 / (n - 1) as f64;
            let leg = (x.floor() as usize).min(2);
            let t = x - leg as f64;
            let pips = path[leg] + (path[leg + 1] - path[leg]) * t;

            let bid = config.start_price + scale.to_price(pips);
            let timestamp =
                config.start + Duration::milliseconds(ticks.len() as i64 * config.tick_interval_ms);
            ticks.push(Tick::new(config.symbol.as_str(), bid, bid + spread, timestamp)?);
        }
        open = close;
    }
    Ok(ticks)
}

/// The scripted section followed by a seeded random walk in cycles of
/// drift/pullback/drift/chop. Step sizes are in pips.
pub fn synthetic_ticks(config: &SyntheticConfig) -> Result<Vec<Tick>> {
    let scale = PipScale::for_symbol(&config.symbol);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let rally = Normal::new(0.02, 0.1)?;
    let retrace = Normal::new(-0.05, 0.08)?;
    let resume = Normal::new(0.04, 0.12)?;
    let chop = Normal::new(0.0, 0.15)?;

    let count = config.ticks_per_day * config.days as usize;
    let mut ticks = scripted_ticks(config)?;
    ticks.truncate(count);
    ticks.reserve(count - ticks.len());
    let mut bid = ticks.last().map_or(config.start_price, |t| t.bid);

    for i in ticks.len()..count {
        let step_pips = match i % 2000 {
            0..=499 => rally.sample(&mut rng),
            500..=699 => retrace.sample(&mut rng),
            700..=1199 => resume.sample(&mut rng),
            _ => chop.sample(&mut rng),
        };
        bid += scale.to_price(step_pips);

        let spread = scale.to_price(0.5 + rng.gen_range(0.0..0.3));
        let timestamp = config.start + Duration::milliseconds(i as i64 * config.tick_interval_ms);
        ticks.push(Tick::new(config.symbol.as_str(), bid, bid + spread, timestamp)?);
    }

    debug!(
        "Generated {} synthetic ticks for {} (seed {})",
        ticks.len(),
        config.symbol,
        config.seed
    );
    Ok(ticks)
}
