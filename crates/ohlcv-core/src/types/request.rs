//! Request descriptor handed to source connectors and the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Timeframe;

/// What to fetch for one symbol and how to shape it.
///
/// Built by the caller, consumed by a connector and its pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRequest {
    /// Instrument symbol, e.g. "SPY"
    pub symbol: String,
    /// Timeframe the source stores
    pub timeframe: Timeframe,
    /// Timeframe the caller wants back
    pub transform: Timeframe,
    /// First date to keep, inclusive
    pub start: Option<NaiveDate>,
    /// Last date to keep, inclusive
    pub end: Option<NaiveDate>,
    /// Keep only regular-trading-hours bars for intraday series
    pub rth_only: bool,
    /// Return an empty series instead of failing when the symbol is absent
    pub graceful: bool,
    /// Source-specific options
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl BarRequest {
    /// Request `symbol` at `timeframe` without resampling.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            transform: timeframe,
            start: None,
            end: None,
            rth_only: true,
            graceful: false,
            extra: HashMap::new(),
        }
    }

    /// Resample to `transform`.
    pub fn with_transform(mut self, transform: Timeframe) -> Self {
        self.transform = transform;
        self
    }

    /// Restrict to a date range.
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Toggle regular-trading-hours filtering.
    pub fn with_rth_only(mut self, rth_only: bool) -> Self {
        self.rth_only = rth_only;
        self
    }

    /// Toggle graceful handling of absent symbols.
    pub fn with_graceful(mut self, graceful: bool) -> Self {
        self.graceful = graceful;
        self
    }

    /// Add a source-specific option.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Both bounds of the date range, when the range is fully specified.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start.zip(self.end)
    }

    /// Read a boolean option from `extra`.
    pub fn extra_flag(&self, key: &str) -> bool {
        self.extra
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}
