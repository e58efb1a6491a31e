//! Candle Cache Inspection Tool
//!
//! CLI tool to verify what the engine's periodic candle cache snapshot
//! (§4.B/§6, `data_dir/candle_cache.json`) actually holds, without
//! starting the engine itself.
//!
//! Usage:
//!   cargo run --release --bin candle-cache-inspect -- --path ./data/candle_cache.json summary
//!   cargo run --release --bin candle-cache-inspect -- --path ./data/candle_cache.json symbol --symbol EURUSD

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elite_guard::candles::cache::CandleCacheFile;

#[derive(Parser, Debug)]
#[command(name = "candle-cache-inspect")]
#[command(about = "Inspect a persisted elite-guard candle cache file")]
struct Cli {
    /// Path to the candle cache JSON file
    #[arg(short, long)]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the snapshot timestamp and per-symbol bar counts
    Summary,

    /// Dump the closed bars for one symbol, one timeframe
    Symbol {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long, default_value = "m1")]
        timeframe: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let raw = std::fs::read(&cli.path).with_context(|| format!("reading {}", cli.path.display()))?;
    let file: CandleCacheFile = serde_json::from_slice(&raw).context("parsing candle cache file")?;

    match cli.command {
        Commands::Summary => print_summary(&file),
        Commands::Symbol { symbol, timeframe } => print_symbol(&file, &symbol, &timeframe)?,
    }
    Ok(())
}

fn print_summary(file: &CandleCacheFile) {
    println!("snapshot taken at: {}", file.timestamp);
    let age = chrono::Utc::now() - file.timestamp;
    println!("age: {} minutes", age.num_minutes());
    println!();
    println!("{:<12} {:>6} {:>6} {:>6}", "symbol", "m1", "m5", "m15");
    let mut symbols: Vec<&String> = file.m1_data.keys().collect();
    symbols.sort();
    for symbol in symbols {
        let m1 = file.m1_data.get(symbol).map(Vec::len).unwrap_or(0);
        let m5 = file.m5_data.get(symbol).map(Vec::len).unwrap_or(0);
        let m15 = file.m15_data.get(symbol).map(Vec::len).unwrap_or(0);
        println!("{:<12} {:>6} {:>6} {:>6}", symbol, m1, m5, m15);
    }
}

fn print_symbol(file: &CandleCacheFile, symbol: &str, timeframe: &str) -> Result<()> {
    let bars = match timeframe.to_ascii_lowercase().as_str() {
        "m1" => file.m1_data.get(symbol),
        "m5" => file.m5_data.get(symbol),
        "m15" => file.m15_data.get(symbol),
        other => anyhow::bail!("unknown timeframe '{other}', expected m1/m5/m15"),
    };
    let Some(bars) = bars else {
        println!("no cached bars for {symbol}/{timeframe}");
        return Ok(());
    };
    for candle in bars {
        println!(
            "{} open={:.5} high={:.5} low={:.5} close={:.5} volume={:.1}",
            candle.bucket_start_ts, candle.open, candle.high, candle.low, candle.close, candle.volume
        );
    }
    Ok(())
}
