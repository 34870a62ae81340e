//! OHLCV (Open, High, Low, Close, Volume) data types.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Timeframe;

/// Signed run-length of consecutive up (positive) or down (negative) moves
/// per price column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakCounters {
    pub open: i32,
    pub high: i32,
    pub low: i32,
    pub close: i32,
}

/// One sampling interval of trading activity.
///
/// Missing cells are represented as `f64::NAN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the interval, exchange-local and timezone-naive
    pub timestamp: NaiveDateTime,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Traded volume, fractional for FX
    pub volume: f64,
    /// 1-based ordinal of the bar within its calendar year (daily series only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    /// Consecutive-direction counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<StreakCounters>,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            day: None,
            streak: None,
        }
    }

    /// A bar that only knows its last traded price.
    pub fn quote(timestamp: NaiveDateTime, price: f64) -> Self {
        Self::new(timestamp, f64::NAN, f64::NAN, f64::NAN, price, f64::NAN)
    }

    /// Calendar date of the bar.
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Check whether any OHLCV cell is missing.
    #[inline]
    pub fn has_missing(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Check `low <= min(open, close) <= max(open, close) <= high`.
    ///
    /// Bars with missing cells are reported as inconsistent.
    pub fn is_consistent(&self) -> bool {
        if self.has_missing() {
            return false;
        }
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }

    /// Calculate the bar's range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Ordered, time-indexed table of bars for one instrument at one timeframe.
///
/// Timestamps are strictly increasing. Gaps are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    /// Symbol identifier, empty until attached
    pub symbol: String,
    /// Timeframe of the bars
    pub timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Create an empty series.
    pub fn empty(timeframe: Timeframe) -> Self {
        Self {
            symbol: String::new(),
            timeframe,
            bars: Vec::new(),
        }
    }

    /// Build a series from bars in any order.
    ///
    /// Bars are sorted by timestamp and duplicate timestamps are dropped,
    /// keeping the first occurrence.
    pub fn new(timeframe: Timeframe, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self {
            symbol: String::new(),
            timeframe,
            bars,
        }
    }

    /// Set the symbol tag.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Replace the bars keeping symbol and timeframe.
    ///
    /// The caller must hand over bars that are already ordered.
    pub fn with_bars(self, bars: Vec<Bar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { bars, ..self }
    }

    /// Replace the bars and the timeframe, keeping the symbol.
    pub fn resampled(self, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            timeframe,
            ..self.with_bars(bars)
        }
    }

    /// Append a bar after the last one.
    ///
    /// Returns `false` and leaves the series untouched when the bar does not
    /// come strictly after the current last bar.
    pub fn push(&mut self, bar: Bar) -> bool {
        match self.bars.last() {
            Some(last) if last.timestamp >= bar.timestamp => false,
            _ => {
                self.bars.push(bar);
                true
            }
        }
    }

    /// Get the number of bars.
    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Check if the series is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get all bars as a slice.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Take ownership of the bars.
    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    /// Get the first bar.
    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    /// Get the last bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Get a bar by index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Find the bar starting exactly at `timestamp`.
    pub fn at(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&timestamp, |b| b.timestamp)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Check whether any bar falls on `date`.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.bars.iter().any(|b| b.date() == date)
    }

    /// Extract close prices as a vector.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Extract volumes as a vector.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Get an iterator over the bars.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}
