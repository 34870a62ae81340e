//! Error types for bar ingestion and post-processing.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::Timeframe;

/// Errors raised while loading, resampling or validating bar series.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unsupported transform: '{from}' to '{to}'")]
    UnsupportedTransform { from: Timeframe, to: Timeframe },

    #[error("No data available for {symbol} from {} to {}", fmt_date(.from), fmt_date(.to))]
    NoData {
        symbol: String,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },

    #[error("{symbol} not found in {location}")]
    NotFound { symbol: String, location: String },

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request for {symbol} timed out after {secs} seconds")]
    Timeout { symbol: String, secs: u64 },
}

fn fmt_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

impl DataError {
    /// Whether the error names a configuration problem rather than missing or bad data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            DataError::UnsupportedTransform { .. }
                | DataError::InvalidTimeframe(_)
                | DataError::InvalidSource(_)
        )
    }
}

/// Result type alias for data operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DataError::UnsupportedTransform {
            from: Timeframe::Week,
            to: Timeframe::Minutes(5),
        };
        assert_eq!(err.to_string(), "Unsupported transform: 'week' to '5min'");
        assert!(err.is_config());

        let err = DataError::NoData {
            symbol: "SPY".to_string(),
            from: NaiveDate::from_ymd_opt(2016, 1, 1),
            to: None,
        };
        assert_eq!(
            err.to_string(),
            "No data available for SPY from 2016-01-01 to -"
        );
        assert!(!err.is_config());
    }
}
