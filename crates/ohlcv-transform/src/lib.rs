//! Resampling and post-processing of bar series.
//!
//! This crate provides:
//! - Timeframe aggregation driven by a transform table
//! - Regular-trading-hours filtering
//! - Data-quality validation against a trading calendar
//! - Metadata annotation (trading-day ordinal, streaks, fill-forward)
//! - The ordered post-processing pipeline every connector runs

pub mod aggregator;
pub mod annotator;
pub mod calendar;
pub mod pipeline;
pub mod session;
pub mod validator;

pub use aggregator::{Aggregator, Reduction, TransformTable};
pub use annotator::{MetadataAnnotator, DEFAULT_STREAK_LOOKBACK};
pub use calendar::WeekdayCalendar;
pub use pipeline::{PipelineConfig, PostProcessPipeline, Stage};
pub use session::{SessionFilter, SessionWindow};
pub use validator::{Diagnostic, Validator};
