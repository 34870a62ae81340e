//! Post-processing pipeline.
//!
//! A raw series from a connector goes through a fixed list of stages. Each
//! stage takes the previous stage's output by value.

use chrono::NaiveDate;
use ohlcv_core::{BarRequest, BarSeries, DataError, LiveQuotes, Timeframe, TradingCalendar};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::aggregator::Aggregator;
use crate::annotator::{MetadataAnnotator, DEFAULT_STREAK_LOOKBACK};
use crate::calendar::WeekdayCalendar;
use crate::session::{SessionFilter, SessionWindow};
use crate::validator::Validator;

/// One post-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Clip to the requested date range
    FilterDates,
    /// Keep regular-trading-hours bars
    FilterSession,
    /// Data-quality checks
    Validate,
    /// Append the connector's live quote
    AppendQuote,
    /// Resample to the requested timeframe
    Transform,
    /// Fill missing cells from the previous row
    FillForward,
    /// Per-year trading-day ordinal (daily output only)
    TradingDays,
    /// Consecutive-move counters
    Streaks,
    /// Tag with the request symbol
    AttachSymbol,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FilterDates => "filter_dates",
            Stage::FilterSession => "filter_session",
            Stage::Validate => "validate",
            Stage::AppendQuote => "append_quote",
            Stage::Transform => "transform",
            Stage::FillForward => "fill_forward",
            Stage::TradingDays => "trading_days",
            Stage::Streaks => "streaks",
            Stage::AttachSymbol => "attach_symbol",
        };
        f.write_str(name)
    }
}

/// Pipeline behaviour that comes from configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub session: SessionWindow,
    pub streaks: bool,
    pub streak_window: usize,
    pub holidays: Vec<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session: SessionWindow::default(),
            streaks: false,
            streak_window: DEFAULT_STREAK_LOOKBACK,
            holidays: Vec::new(),
        }
    }
}

/// Turns a raw connector series into the finished series.
///
/// Each connector owns one pipeline.
#[derive(Clone)]
pub struct PostProcessPipeline {
    config: PipelineConfig,
    validator: Validator,
    session: SessionFilter,
    aggregator: Aggregator,
    annotator: MetadataAnnotator,
}

impl PostProcessPipeline {
    /// Create a pipeline using a weekday calendar with the configured holidays.
    pub fn new(config: PipelineConfig) -> Self {
        let calendar = WeekdayCalendar::with_holidays(config.holidays.iter().copied());
        debug!("Weekday calendar with {} holidays", calendar.holiday_count());
        Self::with_calendar(config, Arc::new(calendar))
    }

    /// Create a pipeline validating against `calendar`.
    pub fn with_calendar(config: PipelineConfig, calendar: Arc<dyn TradingCalendar>) -> Self {
        Self {
            session: SessionFilter::new(config.session),
            validator: Validator::new(calendar),
            aggregator: Aggregator::new(),
            annotator: MetadataAnnotator::new(),
            config,
        }
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stages run for every request, in order.
    ///
    /// `TradingDays` only acts on daily output.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = vec![
            Stage::FilterDates,
            Stage::FilterSession,
            Stage::Validate,
            Stage::AppendQuote,
            Stage::Transform,
            Stage::FillForward,
            Stage::TradingDays,
        ];
        if self.config.streaks {
            stages.push(Stage::Streaks);
        }
        stages.push(Stage::AttachSymbol);
        stages
    }

    /// Run every stage on `raw`.
    ///
    /// `quotes` is the connector that produced `raw`.
    pub async fn run(
        &self,
        raw: BarSeries,
        request: &BarRequest,
        quotes: &dyn LiveQuotes,
    ) -> Result<BarSeries, DataError> {
        debug!(
            "Post-processing {} ({} bars, {} -> {})",
            request.symbol,
            raw.len(),
            request.timeframe,
            request.transform
        );

        let mut series = raw;
        for stage in self.stages() {
            series = match stage {
                Stage::AppendQuote => quotes.append_live_quote(series, &request.symbol).await?,
                other => self.apply(other, series, request)?,
            };
        }
        Ok(series)
    }

    /// Run one synchronous stage.
    ///
    /// `AppendQuote` needs a connector and passes the series through here.
    pub fn apply(
        &self,
        stage: Stage,
        series: BarSeries,
        request: &BarRequest,
    ) -> Result<BarSeries, DataError> {
        let out = match stage {
            Stage::FilterDates => Self::filter_dates(series, request.start, request.end),
            Stage::FilterSession => self.session.filter_rth(series, request.rth_only),
            Stage::Validate => {
                self.validator.validate(&series, request)?;
                series
            }
            Stage::AppendQuote => series,
            Stage::Transform => {
                self.aggregator
                    .aggregate(series, request.timeframe, request.transform)?
            }
            Stage::FillForward => self.annotator.fill_forward(series),
            Stage::TradingDays if request.transform == Timeframe::DAY => {
                self.annotator.add_trading_day_ordinal(series)
            }
            Stage::TradingDays => series,
            Stage::Streaks => self
                .annotator
                .add_streak_counters(series, self.config.streak_window),
            Stage::AttachSymbol => self.annotator.attach_symbol(series, &request.symbol),
        };
        debug!("Stage {} done: {} bars", stage, out.len());
        Ok(out)
    }

    /// Keep bars whose date lies in `[start, end]`.
    ///
    /// No-op unless both bounds are given.
    pub fn filter_dates(
        series: BarSeries,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> BarSeries {
        let Some((start, end)) = start.zip(end) else {
            return series;
        };
        let bars = series
            .iter()
            .filter(|b| (start..=end).contains(&b.date()))
            .copied()
            .collect();
        series.with_bars(bars)
    }
}
