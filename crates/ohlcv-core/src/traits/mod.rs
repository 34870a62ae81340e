//! Core traits for bar sources.

mod calendar;
mod source;

pub use calendar::TradingCalendar;
pub use source::{LiveQuotes, NoQuotes, SourceConnector};
