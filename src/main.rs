use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pullback_scalper::config::{load_config, ScalperConfig};
use pullback_scalper::pipeline::feed::{load_csv, synthetic_ticks, SyntheticConfig, TickNormalizer};
use pullback_scalper::pipeline::replay_trading::run_replay;

#[derive(Parser, Debug)]
#[command(name = "pullback-scalper")]
#[command(about = "Impulse/pullback scalping engine with tick replay")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay ticks through the strategy and print a performance report
    Replay {
        /// Tick CSV (columns: timestamp/time, bid, ask, price, spread, symbol)
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Generate seeded synthetic ticks instead of reading a file
        #[arg(long)]
        synthetic: bool,

        /// Days of synthetic data
        #[arg(long, default_value = "2")]
        days: u32,

        /// Seed for synthetic data
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Symbol to trade (overrides the config file)
        #[arg(long, env = "SCALPER_SYMBOL")]
        symbol: Option<String>,

        /// JSON config file
        #[arg(long, env = "SCALPER_CONFIG")]
        config: Option<PathBuf>,

        /// Bid used for CSV rows that carry no price
        #[arg(long)]
        fallback_bid: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match args.command {
        Commands::Replay {
            csv,
            synthetic,
            days,
            seed,
            symbol,
            config,
            fallback_bid,
            json,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => ScalperConfig::default(),
            };
            if let Some(symbol) = symbol {
                config.symbol = symbol;
            }

            let ticks = match (csv, synthetic) {
                (Some(path), _) => {
                    let mut normalizer = TickNormalizer::new(&config.symbol);
                    if let Some(bid) = fallback_bid {
                        normalizer = normalizer.with_fallback_bid(bid);
                    }
                    load_csv(&path, &normalizer)?
                }
                (None, true) => {
                    info!("Generating {} days of synthetic ticks (seed {})", days, seed);
                    synthetic_ticks(&SyntheticConfig {
                        symbol: config.symbol.clone(),
                        days,
                        seed,
                        start_price: default_start_price(&config.symbol),
                        start: Utc
                            .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
                            .single()
                            .context("invalid synthetic start time")?,
                        ticks_per_candle: config.candles.ticks_per_candle,
                        ..Default::default()
                    })?
                }
                (None, false) => bail!("pass --csv <file> or --synthetic"),
            };

            let result = run_replay(&config, &ticks)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result.report)?);
            } else {
                println!("\n{}\n", result.report);
            }
        }
    }

    Ok(())
}

fn default_start_price(symbol: &str) -> f64 {
    if symbol.contains("JPY") {
        150.00
    } else if symbol.contains("XAU") {
        2000.0
    } else {
        1.1000
    }
}
