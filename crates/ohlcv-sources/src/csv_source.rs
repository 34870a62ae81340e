//! CSV directory source.

use async_trait::async_trait;
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord};
use ohlcv_core::{Bar, BarRequest, BarSeries, DataError, LiveQuotes, SourceConnector, Timeframe};
use ohlcv_transform::PostProcessPipeline;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::timestamps::{parse_number, parse_timestamp, TimestampFormat};

/// Names of the six logical columns in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "Date".to_string(),
            open: "Open".to_string(),
            high: "High".to_string(),
            low: "Low".to_string(),
            close: "Close".to_string(),
            volume: "Volume".to_string(),
        }
    }
}

impl ColumnMap {
    /// Build from names in timestamp, open, high, low, close, volume order.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, DataError> {
        match names {
            [t, o, h, l, c, v] => Ok(Self {
                timestamp: t.as_ref().to_string(),
                open: o.as_ref().to_string(),
                high: h.as_ref().to_string(),
                low: l.as_ref().to_string(),
                close: c.as_ref().to_string(),
                volume: v.as_ref().to_string(),
            }),
            _ => Err(DataError::Parse(format!(
                "Expected 6 column names, got {}",
                names.len()
            ))),
        }
    }

    fn names(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.open,
            &self.high,
            &self.low,
            &self.close,
            &self.volume,
        ]
    }

    /// Resolve each logical column to its position in `headers`.
    ///
    /// Names match exactly first, then ignoring ASCII case.
    fn positions(&self, headers: &StringRecord) -> Result<[usize; 6], DataError> {
        let mut positions = [0usize; 6];
        for (slot, name) in positions.iter_mut().zip(self.names()) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == name)
                .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name)))
                .ok_or_else(|| DataError::Parse(format!("Missing column '{}'", name)))?;
        }
        Ok(positions)
    }
}

/// Loads `{prefix}_{SYMBOL}.csv` or `{SYMBOL}.csv` from a list of directories.
pub struct CsvSource {
    name: String,
    paths: Vec<PathBuf>,
    prefixes: Vec<String>,
    columns: ColumnMap,
    format: TimestampFormat,
    tz: Tz,
    pipeline: PostProcessPipeline,
}

impl CsvSource {
    /// Create a source searching `paths` in order.
    pub fn new(name: impl Into<String>, paths: Vec<PathBuf>, pipeline: PostProcessPipeline) -> Self {
        Self {
            name: name.into(),
            paths,
            prefixes: Vec::new(),
            columns: ColumnMap::default(),
            format: TimestampFormat::Iso,
            tz: chrono_tz::America::New_York,
            pipeline,
        }
    }

    /// File-name prefixes tried before the bare symbol.
    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn with_columns(mut self, columns: ColumnMap) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_format(mut self, format: TimestampFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    /// Files tried for `symbol`, in search order.
    pub fn candidates(&self, symbol: &str) -> Vec<PathBuf> {
        self.paths
            .iter()
            .flat_map(|dir| {
                self.prefixes
                    .iter()
                    .filter(|p| !p.is_empty())
                    .map(move |p| dir.join(format!("{}_{}.csv", p, symbol)))
                    .chain(std::iter::once(dir.join(format!("{}.csv", symbol))))
            })
            .collect()
    }

    /// First existing file for `symbol`.
    pub fn locate(&self, symbol: &str) -> Option<PathBuf> {
        self.candidates(symbol).into_iter().find(|path| {
            debug!("Trying '{}'", path.display());
            path.is_file()
        })
    }

    /// Read a file into a raw series at `timeframe`.
    pub fn read_file(&self, path: &Path, timeframe: Timeframe) -> Result<BarSeries, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::Parse(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| DataError::Parse(e.to_string()))?
            .clone();
        let [t, o, h, l, c, v] = self.columns.positions(&headers)?;

        let mut bars = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| DataError::Parse(e.to_string()))?;
            let cell = |i: usize| record.get(i).unwrap_or("");

            bars.push(Bar::new(
                parse_timestamp(cell(t), self.format, self.tz)?,
                parse_number(cell(o))?,
                parse_number(cell(h))?,
                parse_number(cell(l))?,
                parse_number(cell(c))?,
                parse_number(cell(v))?,
            ));
        }

        Ok(BarSeries::new(timeframe, bars))
    }

    fn location(&self) -> String {
        let dirs: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("[{}]", dirs.join(", "))
    }
}

#[async_trait]
impl LiveQuotes for CsvSource {}

#[async_trait]
impl SourceConnector for CsvSource {
    async fn fetch(&self, request: &BarRequest) -> Result<BarSeries, DataError> {
        let Some(path) = self.locate(&request.symbol) else {
            if request.graceful {
                warn!("{} not found in {}", request.symbol, self.location());
                return Ok(BarSeries::empty(request.transform).with_symbol(&request.symbol));
            }
            return Err(DataError::NotFound {
                symbol: request.symbol.clone(),
                location: self.location(),
            });
        };

        let raw = self.read_file(&path, request.timeframe)?;
        match (raw.first(), raw.last()) {
            (Some(first), Some(last)) => info!(
                "{}, {} rows ({} to {})",
                path.display(),
                raw.len(),
                first.timestamp,
                last.timestamp
            ),
            _ => info!("{}, 0 rows", path.display()),
        }

        self.pipeline.run(raw, request, self).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
