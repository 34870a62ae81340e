//! Core types and traits for OHLCV bar series.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, BarSeries, Timeframe)
//! - The request descriptor handed to source connectors (BarRequest)
//! - Core traits for source connectors, live quotes and trading calendars

pub mod types;
pub mod traits;
pub mod error;

pub use error::{DataError, DataResult};
pub use types::*;
pub use traits::*;
