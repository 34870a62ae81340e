//! Core data types for bar series.

mod ohlcv;
mod request;
mod timeframe;

pub use ohlcv::{Bar, BarSeries, StreakCounters};
pub use request::BarRequest;
pub use timeframe::Timeframe;
