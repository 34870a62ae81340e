//! CLI definitions.

pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use ohlcv_core::Timeframe;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ohlcv")]
#[command(author, version, about = "Download, resample and clean OHLCV bar series")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch series for many symbols and write one CSV per symbol
    Download(DownloadArgs),
    /// List available source connectors
    Sources,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct DownloadArgs {
    /// Source connector key (see `ohlcv sources`)
    #[arg(short, long)]
    pub source: String,

    /// Symbols to fetch (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',', required_unless_present = "file")]
    pub symbols: Vec<String>,

    /// File with one symbol per line
    #[arg(short, long, conflicts_with = "symbols")]
    pub file: Option<PathBuf>,

    /// Whole calendar years, one request each (comma-separated)
    #[arg(short, long, value_delimiter = ',', conflicts_with_all = ["start", "end"])]
    pub years: Vec<i32>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Timeframe of the stored data
    #[arg(short, long, default_value = "day")]
    pub timeframe: Timeframe,

    /// Timeframe to resample to
    #[arg(long)]
    pub transform: Option<Timeframe>,

    /// Keep only regular trading hours (default)
    #[arg(long, conflicts_with = "all_hours")]
    pub rth: bool,

    /// Keep pre- and post-market bars
    #[arg(long)]
    pub all_hours: bool,

    /// Return empty series for missing symbols instead of failing them
    #[arg(long)]
    pub graceful: bool,

    /// Append snapshot rows to daily series (JSON sources)
    #[arg(long)]
    pub snapshots: bool,

    /// Requests in flight, overrides the configured value
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}
