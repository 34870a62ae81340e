//! Source connector trait definitions.

use crate::error::DataError;
use crate::types::{BarRequest, BarSeries};
use async_trait::async_trait;

/// Capability to append a just-now quote row to a series.
///
/// Sources without live quotes keep the default, which returns the series
/// untouched.
#[async_trait]
pub trait LiveQuotes: Send + Sync {
    /// Append the latest quote for `symbol` to `series`.
    async fn append_live_quote(
        &self,
        series: BarSeries,
        _symbol: &str,
    ) -> Result<BarSeries, DataError> {
        Ok(series)
    }
}

/// Quote capability for callers that have no live source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuotes;

impl LiveQuotes for NoQuotes {}

/// Trait for bar sources (files, databases, HTTP APIs).
///
/// A connector loads raw bars and runs them through its post-processing
/// pipeline before returning.
#[async_trait]
pub trait SourceConnector: LiveQuotes {
    /// Fetch the finished series for one request.
    ///
    /// # Arguments
    /// * `request` - Symbol, timeframes, date range and options
    ///
    /// # Returns
    /// The post-processed series with the symbol attached. An absent symbol
    /// fails with [`DataError::NotFound`] unless `request.graceful` is set,
    /// in which case an empty series is returned.
    async fn fetch(&self, request: &BarRequest) -> Result<BarSeries, DataError>;

    /// Open any persistent connection before a batch.
    async fn connect(&self) -> Result<(), DataError> {
        Ok(())
    }

    /// Tear down the connection after a batch.
    async fn disconnect(&self) -> Result<(), DataError> {
        Ok(())
    }

    /// Upper bound on parallel requests the source tolerates.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }

    /// Get the source name.
    fn name(&self) -> &str;
}
