//! Configuration structures.

use chrono::{NaiveDate, NaiveTime};
use ohlcv_transform::{PipelineConfig, SessionWindow, DEFAULT_STREAK_LOOKBACK};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings values that deserialize but make no sense.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid time '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTime(String),

    #[error("Invalid holiday '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Session window is empty: {open} - {close}")]
    EmptySession { open: String, close: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub batch: BatchSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "ohlcv".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Daily-rolling log file, in addition to stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Whether JSON output is configured.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Post-processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Regular session open, "HH:MM"
    pub rth_open: String,
    /// Regular session close, "HH:MM"
    pub rth_close: String,
    /// Compute consecutive-move counters
    pub streaks: bool,
    /// Bars that receive streak counters
    pub streak_window: usize,
    /// Exchange holidays, "YYYY-MM-DD"
    pub holidays: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rth_open: "09:30".to_string(),
            rth_close: "16:00".to_string(),
            streaks: false,
            streak_window: DEFAULT_STREAK_LOOKBACK,
            holidays: Vec::new(),
        }
    }
}

impl PipelineSettings {
    /// Convert into the pipeline's runtime configuration.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, SettingsError> {
        let open = parse_time(&self.rth_open)?;
        let close = parse_time(&self.rth_close)?;
        if open >= close {
            return Err(SettingsError::EmptySession {
                open: self.rth_open.clone(),
                close: self.rth_close.clone(),
            });
        }

        let holidays = self
            .holidays
            .iter()
            .map(|s| {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| SettingsError::InvalidDate(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PipelineConfig {
            session: SessionWindow::new(open, close),
            streaks: self.streaks,
            streak_window: self.streak_window,
            holidays,
        })
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, SettingsError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| SettingsError::InvalidTime(s.to_string()))
}

/// Source connector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Exchange timezone timestamps are converted to
    pub timezone: String,
    pub csv: CsvSourceSettings,
    pub json: JsonSourceSettings,
    pub alpaca: AlpacaConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            csv: CsvSourceSettings::default(),
            json: JsonSourceSettings::default(),
            alpaca: AlpacaConfig::default(),
        }
    }
}

/// CSV directory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSourceSettings {
    /// Directories searched in order
    pub paths: Vec<String>,
    /// File-name prefixes tried before the bare symbol
    pub prefixes: Vec<String>,
    /// Column names for timestamp, open, high, low, close, volume
    pub columns: Vec<String>,
    /// Timestamps are Unix epoch seconds
    pub epoch: bool,
}

impl Default for CsvSourceSettings {
    fn default() -> Self {
        Self {
            paths: vec!["csv".to_string()],
            prefixes: Vec::new(),
            columns: ["Date", "Open", "High", "Low", "Close", "Volume"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            epoch: false,
        }
    }
}

/// JSON directory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSourceSettings {
    /// Directories holding one sub-directory per timeframe
    pub paths: Vec<String>,
    /// Field names for timestamp, open, high, low, close, volume
    pub keys: Vec<String>,
    /// String timestamps are epoch seconds rather than ISO dates
    pub epoch: bool,
}

impl Default for JsonSourceSettings {
    fn default() -> Self {
        Self {
            paths: vec!["json".to_string()],
            keys: ["t", "o", "h", "l", "c", "v"].iter().map(|s| s.to_string()).collect(),
            epoch: true,
        }
    }
}

/// Alpaca market data configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpacaConfig {
    pub api_key_env: String,
    pub api_secret_env: String,
    pub data_url: String,
    /// "iex" or "sip"
    pub feed: String,
    /// Append the latest trade as a quote row
    pub quotes: bool,
    pub timeout_secs: u64,
    pub page_limit: u32,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key_env: "ALPACA_API_KEY".to_string(),
            api_secret_env: "ALPACA_API_SECRET".to_string(),
            data_url: "https://data.alpaca.markets".to_string(),
            feed: "iex".to_string(),
            quotes: false,
            timeout_secs: 30,
            page_limit: 10000,
        }
    }
}

/// Batch fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Requests in flight at once
    pub concurrency: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Leave the connector connected after the batch
    pub keep_alive: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 120,
            keep_alive: false,
        }
    }
}
