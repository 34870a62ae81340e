//! Regular-trading-hours filtering.

use chrono::{NaiveTime, Timelike};
use ohlcv_core::BarSeries;
use tracing::debug;

/// Wall-clock session window, half-open `[open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl SessionWindow {
    /// Create a window from wall-clock bounds.
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Check whether `time` falls inside the window.
    #[inline]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }
}

impl Default for SessionWindow {
    /// US equities regular session, 09:30 to 16:00.
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        }
    }
}

/// Restricts intraday series to the session window.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFilter {
    window: SessionWindow,
}

impl SessionFilter {
    /// Create a filter for `window`.
    pub fn new(window: SessionWindow) -> Self {
        Self { window }
    }

    /// The configured window.
    pub fn window(&self) -> SessionWindow {
        self.window
    }

    /// Keep only bars inside the window.
    ///
    /// Daily and coarser series, and calls with `restrict == false`, are
    /// returned unchanged.
    pub fn filter_rth(&self, series: BarSeries, restrict: bool) -> BarSeries {
        if !restrict || !series.timeframe.is_intraday() {
            return series;
        }

        debug!(
            "Filtering for RTH only ({} - {})",
            self.window.open.format("%H:%M"),
            self.window.close.format("%H:%M")
        );

        let before = series.len();
        let bars = series
            .iter()
            .filter(|b| self.window.contains(b.timestamp.time().with_nanosecond(0).unwrap_or_default()))
            .copied()
            .collect::<Vec<_>>();
        debug!("Dropped {} bars outside RTH", before - bars.len());

        series.with_bars(bars)
    }
}
