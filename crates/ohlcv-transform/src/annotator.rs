//! Derived metadata columns.
//!
//! Annotations never touch O/H/L/C/V, except `fill_forward` which only
//! replaces missing cells.

use chrono::Datelike;
use ohlcv_core::{Bar, BarSeries, StreakCounters, Timeframe};
use tracing::debug;

/// Default number of trailing bars that receive streak counters.
pub const DEFAULT_STREAK_LOOKBACK: usize = 10;

/// Adds trading-day ordinals, streak counters and the symbol tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataAnnotator;

impl MetadataAnnotator {
    /// Create a new annotator.
    pub fn new() -> Self {
        Self
    }

    /// Number each daily bar within its calendar year, starting at 1.
    ///
    /// Non-daily series are returned unchanged.
    pub fn add_trading_day_ordinal(&self, series: BarSeries) -> BarSeries {
        if series.timeframe != Timeframe::DAY {
            return series;
        }

        let mut year = None;
        let mut ordinal = 0;
        let bars = series
            .iter()
            .map(|bar| {
                let y = bar.timestamp.year();
                if year != Some(y) {
                    year = Some(y);
                    ordinal = 0;
                }
                ordinal += 1;
                Bar {
                    day: Some(ordinal),
                    ..*bar
                }
            })
            .collect();

        series.with_bars(bars)
    }

    /// Count consecutive up and down moves per price column over the last
    /// `lookback` bars.
    ///
    /// Every row gets counters. Rows before the window stay at zero.
    pub fn add_streak_counters(&self, series: BarSeries, lookback: usize) -> BarSeries {
        let len = series.len();
        let start = len.saturating_sub(lookback);
        debug!("Computing streaks over {} of {} bars", len - start, len);

        let mut bars = series.bars().to_vec();
        let mut previous = StreakCounters::default();
        for i in 0..len {
            let counters = if i > 0 && i >= start {
                let (today, yesterday) = (&bars[i], &bars[i - 1]);
                StreakCounters {
                    open: step(previous.open, today.open, yesterday.open),
                    high: step(previous.high, today.high, yesterday.high),
                    low: step(previous.low, today.low, yesterday.low),
                    close: step(previous.close, today.close, yesterday.close),
                }
            } else {
                StreakCounters::default()
            };
            bars[i].streak = Some(counters);
            previous = counters;
        }

        series.with_bars(bars)
    }

    /// Replace every missing cell with the value of the row before it.
    ///
    /// Missing cells in the first row stay missing.
    pub fn fill_forward(&self, series: BarSeries) -> BarSeries {
        let mut bars = series.bars().to_vec();
        for i in 1..bars.len() {
            let prev = bars[i - 1];
            let bar = &mut bars[i];
            fill(&mut bar.open, prev.open);
            fill(&mut bar.high, prev.high);
            fill(&mut bar.low, prev.low);
            fill(&mut bar.close, prev.close);
            fill(&mut bar.volume, prev.volume);
        }
        series.with_bars(bars)
    }

    /// Tag the series with its symbol.
    pub fn attach_symbol(&self, series: BarSeries, symbol: &str) -> BarSeries {
        series.with_symbol(symbol)
    }
}

#[inline]
fn fill(cell: &mut f64, prev: f64) {
    if cell.is_nan() {
        *cell = prev;
    }
}

/// Advance one streak counter. Missing prices reset it.
#[inline]
fn step(previous: i32, today: f64, yesterday: f64) -> i32 {
    if today >= yesterday {
        if previous >= 0 {
            previous + 1
        } else {
            1
        }
    } else if today < yesterday {
        if previous <= 0 {
            previous - 1
        } else {
            -1
        }
    } else {
        0
    }
}
