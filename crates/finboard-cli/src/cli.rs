//! CLI argument definitions for finboard.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Latest snapshot for one or more symbols |
//! | `history` | OHLCV history for a symbol |
//! | `indicators` | Snapshot with RSI, MACD and SMA computed from history |
//! | `cache` | Inspect or clear the local snapshot cache |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--no-persist` | `false` | Keep the cache in memory only |
//! | `--refresh` | `false` | Bypass fresh cache entries |
//! | `--home` | `$FINBOARD_HOME` | Data directory for the DuckDB cache |
//! | `--timeout-ms` | env / `10000` | Per-request timeout |
//!
//! # Examples
//!
//! ```bash
//! finboard quote AAPL MSFT --pretty
//! finboard history NVDA --period 6mo
//! finboard --refresh indicators AAPL --period 1y
//! finboard cache clear AAPL
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Market-data snapshots with caching, retries and stale fallback.
#[derive(Debug, Parser)]
#[command(name = "finboard", author, version, about = "Market-data collector for the finboard dashboard")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Do not read or write the on-disk cache.
    #[arg(long, global = true, default_value_t = false)]
    pub no_persist: bool,

    /// Fetch from the provider even when the cached snapshot is fresh.
    #[arg(long, global = true, default_value_t = false)]
    pub refresh: bool,

    /// Data directory; overrides `FINBOARD_HOME`.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Per-request timeout in milliseconds; overrides `FINBOARD_REQUEST_TIMEOUT_MS`.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Latest snapshot for each symbol.
    Quote(QuoteArgs),
    /// Price history for a symbol.
    History(HistoryArgs),
    /// Snapshot with technical indicators.
    Indicators(HistoryArgs),
    /// Local cache administration.
    Cache(CacheArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quote(_) => "quote",
            Self::History(_) => "history",
            Self::Indicators(_) => "indicators",
            Self::Cache(args) => match args.command {
                CacheCommand::Status => "cache.status",
                CacheCommand::Clear(_) => "cache.clear",
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Ticker symbols, e.g. AAPL BRK-B ^GSPC.
    #[arg(required = true)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// Lookback window: 1mo, 3mo, 6mo, 1y, 2y, 5y or max.
    #[arg(long, default_value = "1y")]
    pub period: String,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List cached symbols with their age and freshness.
    Status,
    /// Evict one symbol, or everything.
    Clear(ClearArgs),
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    pub symbol: Option<String>,
}
