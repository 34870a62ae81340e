//! Concurrent batch fetching.
//!
//! Requests run with bounded concurrency on the tokio runtime. Results are
//! collected in completion order; a failing request is logged and left out
//! without affecting the others.

use futures::stream::{self, StreamExt};
use ohlcv_core::{BarRequest, BarSeries, DataError, SourceConnector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Requests in flight when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Upper bound on requests in flight.
pub const MAX_CONCURRENCY: usize = 20;

/// Finished series of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successful series in completion order
    pub series: Vec<BarSeries>,
    pub requested: usize,
    pub succeeded: usize,
}

impl BatchOutcome {
    /// Requests that failed or timed out.
    pub fn failed_count(&self) -> usize {
        self.requested - self.succeeded
    }

    /// Series for `symbol`, if it succeeded.
    pub fn get(&self, symbol: &str) -> Option<&BarSeries> {
        self.series.iter().find(|s| s.symbol == symbol)
    }
}

/// Runs many requests against one connector.
pub struct BatchRunner {
    connector: Arc<dyn SourceConnector>,
    concurrency: usize,
    timeout: Duration,
    keep_alive: bool,
}

impl BatchRunner {
    pub fn new(connector: Arc<dyn SourceConnector>) -> Self {
        Self {
            connector,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(120),
            keep_alive: false,
        }
    }

    /// Requests in flight, clamped to `1..=20`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip `disconnect` after the batch.
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Concurrency after applying the connector's own cap.
    pub fn effective_concurrency(&self) -> usize {
        match self.connector.max_concurrency() {
            Some(cap) => self.concurrency.min(cap.max(1)),
            None => self.concurrency,
        }
    }

    /// Fetch one request, bounded by the timeout.
    async fn fetch_one(&self, request: BarRequest) -> Result<BarSeries, DataError> {
        match tokio::time::timeout(self.timeout, self.connector.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout {
                symbol: request.symbol.clone(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Fetch every request.
    ///
    /// Only a failure to connect aborts the batch.
    pub async fn run(&self, requests: Vec<BarRequest>) -> Result<BatchOutcome, DataError> {
        let requested = requests.len();
        let concurrency = self.effective_concurrency();
        info!(
            "Fetching {} requests from {} ({} at a time)",
            requested,
            self.connector.name(),
            concurrency
        );

        self.connector.connect().await?;

        let results: Vec<(String, Result<BarSeries, DataError>)> = stream::iter(requests)
            .map(|request| async move {
                let symbol = request.symbol.clone();
                (symbol, self.fetch_one(request).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        if !self.keep_alive {
            if let Err(e) = self.connector.disconnect().await {
                warn!("Disconnect from {} failed: {}", self.connector.name(), e);
            }
        }

        let mut series = Vec::with_capacity(results.len());
        for (symbol, result) in results {
            match result {
                Ok(s) => series.push(s),
                Err(e) => warn!("Skipping {}: {}", symbol, e),
            }
        }

        let outcome = BatchOutcome {
            succeeded: series.len(),
            series,
            requested,
        };
        info!(
            "Fetched {}/{} requests from {}",
            outcome.succeeded,
            outcome.requested,
            self.connector.name()
        );
        Ok(outcome)
    }
}
