//! End-of-batch summary.

use chrono::NaiveDateTime;
use ohlcv_core::{BarSeries, Timeframe};
use serde::Serialize;
use std::fmt;

/// Row count and span of one delivered series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    /// Rows with at least one missing value
    pub incomplete: usize,
}

impl SeriesSummary {
    pub fn from_series(series: &BarSeries) -> Self {
        Self {
            symbol: series.symbol.clone(),
            timeframe: series.timeframe,
            rows: series.len(),
            first: series.first().map(|b| b.timestamp),
            last: series.last().map(|b| b.timestamp),
            incomplete: series.iter().filter(|b| b.has_missing()).count(),
        }
    }
}

/// What a batch delivered, sorted by symbol.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub source: String,
    /// Symbols asked for
    pub requested: usize,
    /// Requests that failed or timed out, possibly several per symbol
    pub failed_requests: usize,
    pub series: Vec<SeriesSummary>,
}

impl BatchReport {
    pub fn new(source: impl Into<String>, requested: usize, series: &[BarSeries]) -> Self {
        let mut summaries: Vec<SeriesSummary> = series.iter().map(SeriesSummary::from_series).collect();
        summaries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Self {
            source: source.into(),
            requested,
            failed_requests: 0,
            series: summaries,
        }
    }

    pub fn with_failed_requests(mut self, failed: usize) -> Self {
        self.failed_requests = failed;
        self
    }

    pub fn succeeded(&self) -> usize {
        self.series.len()
    }

    /// Symbols that delivered nothing at all.
    pub fn failed(&self) -> usize {
        self.requested.saturating_sub(self.series.len())
    }

    pub fn total_rows(&self) -> usize {
        self.series.iter().map(|s| s.rows).sum()
    }

    /// Series that came back without rows.
    pub fn empty_symbols(&self) -> Vec<&str> {
        self.series
            .iter()
            .filter(|s| s.rows == 0)
            .map(|s| s.symbol.as_str())
            .collect()
    }
}

fn stamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}/{} symbols, {} rows ({} failed)",
            self.source,
            self.succeeded(),
            self.requested,
            self.total_rows(),
            self.failed()
        )?;
        if self.failed_requests > 0 {
            writeln!(f, "  {} requests failed, series may be incomplete", self.failed_requests)?;
        }
        for s in &self.series {
            write!(
                f,
                "  {:<10} {:>6} {:>8} rows  {} .. {}",
                s.symbol,
                s.timeframe.to_string(),
                s.rows,
                stamp(s.first),
                stamp(s.last)
            )?;
            if s.incomplete > 0 {
                write!(f, "  ({} incomplete)", s.incomplete)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
