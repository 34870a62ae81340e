//! Data-quality checks on raw series.
//!
//! Checks never modify the series. Problems are reported as [`Diagnostic`]
//! values and logged; the only hard failure is an empty series over a range
//! that should contain sessions.

use chrono::{Datelike, NaiveDate};
use ohlcv_core::{BarRequest, BarSeries, DataError, Timeframe, TradingCalendar};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Shortfall ratio above which the row-count check warns.
const SHORTFALL_THRESHOLD: f64 = 0.2;

/// A non-fatal data-quality finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Rows with at least one missing O/H/L/C/V cell
    MissingValues { rows: usize },
    /// Fewer rows than the calendar expects
    RowCountShortfall { expected: usize, actual: usize },
    /// Smallest gap between bars differs from the declared interval
    IrregularSpacing { expected_secs: i64, observed_secs: i64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingValues { rows } => write!(f, "{} rows with NaN", rows),
            Diagnostic::RowCountShortfall { expected, actual } => {
                write!(f, "only {} rows, expecting approx. {} rows", actual, expected)
            }
            Diagnostic::IrregularSpacing {
                expected_secs,
                observed_secs,
            } => write!(
                f,
                "timeframe mismatch: expected {}s spacing but have {}s",
                expected_secs, observed_secs
            ),
        }
    }
}

/// Runs the data-quality checks against an injected trading calendar.
#[derive(Clone)]
pub struct Validator {
    calendar: Arc<dyn TradingCalendar>,
}

impl Validator {
    /// Create a validator using `calendar` for expected row counts.
    pub fn new(calendar: Arc<dyn TradingCalendar>) -> Self {
        Self { calendar }
    }

    /// Count rows with any missing cell.
    pub fn check_missing_values(&self, series: &BarSeries) -> Vec<Diagnostic> {
        let rows = series.iter().filter(|b| b.has_missing()).count();
        if rows == 0 {
            return Vec::new();
        }
        vec![Diagnostic::MissingValues { rows }]
    }

    /// Compare the row count with the sessions in `[from, to]`.
    ///
    /// Fails with [`DataError::NoData`] when the series is empty although
    /// the range holds at least one session.
    pub fn check_row_count(
        &self,
        series: &BarSeries,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Diagnostic>, DataError> {
        if from > to {
            return Ok(Vec::new());
        }

        let sessions = self.calendar.sessions(from, to);
        if series.is_empty() {
            if sessions.is_empty() {
                return Ok(Vec::new());
            }
            return Err(DataError::NoData {
                symbol: series.symbol.clone(),
                from: Some(from),
                to: Some(to),
            });
        }

        let expected = match series.timeframe {
            Timeframe::Days(1) => sessions.len(),
            Timeframe::Week => sessions
                .iter()
                .map(|d| {
                    let w = d.iso_week();
                    (w.year(), w.week())
                })
                .collect::<BTreeSet<_>>()
                .len(),
            Timeframe::Month => sessions
                .iter()
                .map(|d| (d.year(), d.month()))
                .collect::<BTreeSet<_>>()
                .len(),
            _ => return Ok(Vec::new()),
        };

        let actual = series.len();
        if expected as f64 / actual as f64 - 1.0 > SHORTFALL_THRESHOLD {
            return Ok(vec![Diagnostic::RowCountShortfall { expected, actual }]);
        }
        Ok(Vec::new())
    }

    /// Check that the smallest gap between intraday bars matches the
    /// declared interval.
    pub fn check_spacing(&self, series: &BarSeries) -> Vec<Diagnostic> {
        if !series.timeframe.is_intraday() || series.len() < 2 {
            return Vec::new();
        }

        let expected_secs = series.timeframe.as_secs() as i64;
        let observed_secs = series
            .bars()
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
            .min()
            .unwrap_or(expected_secs);

        if observed_secs == expected_secs {
            return Vec::new();
        }
        vec![Diagnostic::IrregularSpacing {
            expected_secs,
            observed_secs,
        }]
    }

    /// Run every check applicable to `request` and log the findings.
    pub fn validate(
        &self,
        series: &BarSeries,
        request: &BarRequest,
    ) -> Result<Vec<Diagnostic>, DataError> {
        let mut diagnostics = self.check_missing_values(series);
        diagnostics.extend(self.check_spacing(series));

        if let Some((from, to)) = request.range() {
            let mut rows = self.check_row_count(series, from, to).map_err(|e| match e {
                DataError::NoData { from, to, .. } => DataError::NoData {
                    symbol: request.symbol.clone(),
                    from,
                    to,
                },
                other => other,
            })?;
            diagnostics.append(&mut rows);
        }

        for diagnostic in &diagnostics {
            warn!("{} has {}", request.symbol, diagnostic);
        }

        Ok(diagnostics)
    }
}
