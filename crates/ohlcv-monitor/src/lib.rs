//! Logging and batch reporting.

mod logging;
mod report;

pub use logging::{setup_logging, LogGuard};
pub use report::{BatchReport, SeriesSummary};
