//! In-memory source.

use async_trait::async_trait;
use ohlcv_core::{BarRequest, BarSeries, DataError, LiveQuotes, SourceConnector};
use ohlcv_transform::PostProcessPipeline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Serves pre-loaded raw series through the post-processing pipeline.
pub struct MemorySource {
    series: HashMap<String, BarSeries>,
    pipeline: PostProcessPipeline,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MemorySource {
    pub fn new(pipeline: PostProcessPipeline) -> Self {
        Self {
            series: HashMap::new(),
            pipeline,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Register the raw series for `symbol`.
    pub fn insert(&mut self, symbol: impl Into<String>, series: BarSeries) {
        self.series.insert(symbol.into(), series);
    }

    pub fn with_series(mut self, symbol: impl Into<String>, series: BarSeries) -> Self {
        self.insert(symbol, series);
        self
    }

    /// Number of `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls so far.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveQuotes for MemorySource {}

#[async_trait]
impl SourceConnector for MemorySource {
    async fn fetch(&self, request: &BarRequest) -> Result<BarSeries, DataError> {
        let Some(raw) = self.series.get(&request.symbol) else {
            if request.graceful {
                warn!("{} not found in memory", request.symbol);
                return Ok(BarSeries::empty(request.transform).with_symbol(&request.symbol));
            }
            return Err(DataError::NotFound {
                symbol: request.symbol.clone(),
                location: "memory".to_string(),
            });
        };

        self.pipeline.run(raw.clone(), request, self).await
    }

    async fn connect(&self) -> Result<(), DataError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DataError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
