//! JSON directory source.
//!
//! Files live at `{dir}/{timeframe}/{SYMBOL}.json` and hold one object keyed
//! by symbol. Each row is either an array in key order or an object with
//! those keys. Timestamps are epoch seconds in UTC or ISO strings, per the
//! configured format.
//!
//! Daily requests carrying the `snapshots` option also read
//! `{dir}/snapshots/{SYMBOL}.json` and append its rows for dates the series
//! does not have yet.

use async_trait::async_trait;
use chrono_tz::Tz;
use ohlcv_core::{Bar, BarRequest, BarSeries, DataError, LiveQuotes, SourceConnector, Timeframe};
use ohlcv_transform::PostProcessPipeline;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::timestamps::{parse_timestamp, TimestampFormat};

/// `extra` option that turns on snapshot appending.
pub const SNAPSHOTS_OPTION: &str = "snapshots";

const SNAPSHOTS_DIR: &str = "snapshots";

/// Loads per-timeframe JSON files from a list of directories.
pub struct JsonSource {
    name: String,
    paths: Vec<PathBuf>,
    keys: [String; 6],
    format: TimestampFormat,
    tz: Tz,
    pipeline: PostProcessPipeline,
}

impl JsonSource {
    /// Create a source; `keys` name timestamp, open, high, low, close and volume.
    pub fn new<S: AsRef<str>>(
        paths: Vec<PathBuf>,
        keys: &[S],
        pipeline: PostProcessPipeline,
    ) -> Result<Self, DataError> {
        let keys: [String; 6] = match keys {
            [t, o, h, l, c, v] => [t, o, h, l, c, v].map(|k| k.as_ref().to_string()),
            _ => {
                return Err(DataError::Parse(format!(
                    "Expected 6 JSON keys, got {}",
                    keys.len()
                )))
            }
        };
        Ok(Self {
            name: "json".to_string(),
            paths,
            keys,
            format: TimestampFormat::Epoch,
            tz: chrono_tz::America::New_York,
            pipeline,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// How string timestamps are read. Numeric cells are always epoch seconds.
    pub fn with_format(mut self, format: TimestampFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    fn file_for(dir: &Path, timeframe: Timeframe, symbol: &str) -> PathBuf {
        dir.join(timeframe.to_string()).join(format!("{}.json", symbol))
    }

    /// Rows stored for `symbol` in `path`, `None` when the entry is null or empty.
    fn read_rows(&self, path: &Path, symbol: &str, timeframe: Timeframe) -> Result<Option<BarSeries>, DataError> {
        let text = fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&text).map_err(|e| DataError::Parse(e.to_string()))?;

        let rows = match doc.get(symbol).and_then(Value::as_array) {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(None),
        };

        let bars = rows
            .iter()
            .map(|row| self.parse_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(BarSeries::new(timeframe, bars)))
    }

    /// Load the rows for `symbol`, `None` when no file holds any.
    ///
    /// Also returns the directory the rows came from.
    pub fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<(&Path, PathBuf, BarSeries)>, DataError> {
        for dir in &self.paths {
            let path = Self::file_for(dir, timeframe, symbol);
            debug!("Trying '{}'", path.display());
            if !path.is_file() {
                continue;
            }

            match self.read_rows(&path, symbol, timeframe)? {
                Some(series) => return Ok(Some((dir.as_path(), path, series))),
                None => warn!("Could not find '{}' in file '{}'", symbol, path.display()),
            }
        }
        Ok(None)
    }

    /// Append the snapshot rows of `symbol` found under `dir`.
    ///
    /// Only daily, non-empty series are extended, and a snapshot whose date
    /// is already present is skipped.
    pub fn append_snapshot(&self, mut series: BarSeries, dir: &Path, symbol: &str) -> Result<BarSeries, DataError> {
        if series.is_empty() || series.timeframe != Timeframe::DAY {
            return Ok(series);
        }

        let path = dir.join(SNAPSHOTS_DIR).join(format!("{}.json", symbol));
        debug!("Trying snapshot file: '{}'", path.display());
        let snapshot = if path.is_file() {
            self.read_rows(&path, symbol, Timeframe::DAY)?
        } else {
            None
        };
        let Some(snapshot) = snapshot else {
            warn!("Failed to load snapshot file '{}'", path.display());
            return Ok(series);
        };

        for bar in snapshot.into_bars() {
            if series.contains_date(bar.date()) {
                debug!("Not adding already existing data point {} for {}", bar.date(), symbol);
            } else if !series.push(bar) {
                debug!("Snapshot at {} is before the last bar of {}", bar.timestamp, symbol);
            }
        }
        Ok(series)
    }

    fn parse_row(&self, row: &Value) -> Result<Bar, DataError> {
        let field = |i: usize| match row {
            Value::Array(cells) => cells.get(i),
            Value::Object(map) => map.get(&self.keys[i]),
            _ => None,
        };
        let number = |i: usize| field(i).and_then(Value::as_f64).unwrap_or(f64::NAN);

        let timestamp = match field(0) {
            Some(Value::String(s)) => parse_timestamp(s, self.format, self.tz)?,
            Some(Value::Number(n)) => parse_timestamp(&n.to_string(), TimestampFormat::Epoch, self.tz)?,
            _ => return Err(DataError::Parse(format!("Row without timestamp: {}", row))),
        };

        Ok(Bar::new(
            timestamp,
            number(1),
            number(2),
            number(3),
            number(4),
            number(5),
        ))
    }

    fn location(&self) -> String {
        let dirs: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        format!("[{}]", dirs.join(", "))
    }
}

#[async_trait]
impl LiveQuotes for JsonSource {}

#[async_trait]
impl SourceConnector for JsonSource {
    async fn fetch(&self, request: &BarRequest) -> Result<BarSeries, DataError> {
        let Some((dir, path, mut raw)) = self.load(&request.symbol, request.timeframe)? else {
            if request.graceful {
                warn!("{} not found in {}", request.symbol, self.location());
                return Ok(BarSeries::empty(request.transform).with_symbol(&request.symbol));
            }
            return Err(DataError::NotFound {
                symbol: request.symbol.clone(),
                location: self.location(),
            });
        };

        if let (Some(first), Some(last)) = (raw.first(), raw.last()) {
            info!(
                "{}, {} rows ({} to {})",
                path.display(),
                raw.len(),
                first.timestamp,
                last.timestamp
            );
        }

        if request.extra_flag(SNAPSHOTS_OPTION) {
            raw = self.append_snapshot(raw, dir, &request.symbol)?;
        }

        self.pipeline.run(raw, request, self).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohlcv_transform::PipelineConfig;

    const KEYS: [&str; 6] = ["t", "o", "h", "l", "c", "v"];

    fn source(dir: &Path) -> JsonSource {
        JsonSource::new(
            vec![dir.to_path_buf()],
            &KEYS,
            PostProcessPipeline::new(PipelineConfig::default()),
        )
        .unwrap()
    }

    fn write(dir: &Path, timeframe: &str, symbol: &str, body: &str) {
        let sub = dir.join(timeframe);
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("{}.json", symbol)), body).unwrap();
    }

    #[tokio::test]
    async fn test_array_rows() {
        let dir = tempfile::tempdir().unwrap();
        // 13:30Z and 13:35Z on 2017-10-10, listed out of order
        write(
            dir.path(),
            "5min",
            "SPY",
            r#"{"SPY": [[1507642500, 2, 3, 1, 2.5, 20], [1507642200, 1, 2, 0.5, 1.5, 10]]}"#,
        );

        let series = source(dir.path())
            .fetch(&BarRequest::new("SPY", Timeframe::Minutes(5)))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        let first = series.first().unwrap();
        assert_eq!(first.timestamp.format("%Y-%m-%d %H:%M").to_string(), "2017-10-10 09:30");
        assert_eq!(first.volume, 10.0);
    }

    #[test]
    fn test_object_rows_with_missing_cell() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "day",
            "SPY",
            r#"{"SPY": [{"t": 1507521600, "o": 1, "h": 2, "l": 0.5, "c": 1.5},
                        {"t": 1507608000, "o": 1.5, "h": 2.5, "l": 1, "c": 2, "v": 7}]}"#,
        );

        let raw = source(dir.path()).load("SPY", Timeframe::DAY).unwrap().unwrap().2;
        assert_eq!(raw.len(), 2);
        assert!(raw.first().unwrap().volume.is_nan());
        assert_eq!(raw.last().unwrap().volume, 7.0);
    }

    #[tokio::test]
    async fn test_null_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "day", "SPY", r#"{"SPY": null}"#);

        let err = source(dir.path())
            .fetch(&BarRequest::new("SPY", Timeframe::DAY))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));

        let series = source(dir.path())
            .fetch(&BarRequest::new("SPY", Timeframe::DAY).with_graceful(true))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_wrong_key_count() {
        let result = JsonSource::new(
            Vec::new(),
            &["t", "o"],
            PostProcessPipeline::new(PipelineConfig::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_iso_string_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "5min",
            "SPY",
            r#"{"SPY": [{"DateTime": "2017-10-10T13:35:00Z", "Open": 2, "High": 3, "Low": 1, "Close": 2.5, "Volume": 20},
                        {"DateTime": "2017-10-10T13:30:00Z", "Open": 1, "High": 2, "Low": 0.5, "Close": 1.5, "Volume": 10}]}"#,
        );

        let source = JsonSource::new(
            vec![dir.path().to_path_buf()],
            &["DateTime", "Open", "High", "Low", "Close", "Volume"],
            PostProcessPipeline::new(PipelineConfig::default()),
        )
        .unwrap()
        .with_format(TimestampFormat::Iso);

        let series = source
            .fetch(&BarRequest::new("SPY", Timeframe::Minutes(5)))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        let first = series.first().unwrap();
        assert_eq!(first.timestamp.format("%Y-%m-%d %H:%M").to_string(), "2017-10-10 09:30");
        assert_eq!(first.close, 1.5);
    }

    #[test]
    fn test_unparseable_string_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "day", "SPY", r#"{"SPY": [["not a date", 1, 1, 1, 1, 1]]}"#);

        let source = source(dir.path()).with_format(TimestampFormat::Iso);
        assert!(matches!(source.load("SPY", Timeframe::DAY), Err(DataError::Parse(_))));
    }

    fn daily_with_snapshot(dir: &Path, snapshot_epoch: i64) {
        // 2017-10-09 and 2017-10-10 at midnight in New York
        write(
            dir,
            "day",
            "SPY",
            r#"{"SPY": [[1507521600, 1, 2, 0.5, 1.5, 10], [1507608000, 1.5, 2.5, 1, 2, 10]]}"#,
        );
        write(
            dir,
            "snapshots",
            "SPY",
            &format!(r#"{{"SPY": [[{}, 2, 3, 1.5, 2.5, 5]]}}"#, snapshot_epoch),
        );
    }

    fn snapshot_request() -> BarRequest {
        BarRequest::new("SPY", Timeframe::DAY).with_extra(SNAPSHOTS_OPTION, Value::Bool(true))
    }

    #[tokio::test]
    async fn test_snapshot_appended_for_new_date() {
        let dir = tempfile::tempdir().unwrap();
        // 2017-10-11 00:00 in New York
        daily_with_snapshot(dir.path(), 1507694400);

        let series = source(dir.path()).fetch(&snapshot_request()).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().unwrap().close, 2.5);
        assert_eq!(series.last().unwrap().day, Some(3));

        let plain = source(dir.path())
            .fetch(&BarRequest::new("SPY", Timeframe::DAY))
            .await
            .unwrap();
        assert_eq!(plain.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_skipped_when_date_present() {
        let dir = tempfile::tempdir().unwrap();
        // 2017-10-10 16:00 in New York
        daily_with_snapshot(dir.path(), 1507665600);

        let series = source(dir.path()).fetch(&snapshot_request()).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 2.0);
    }

    #[tokio::test]
    async fn test_missing_snapshot_file_keeps_series() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "day",
            "SPY",
            r#"{"SPY": [[1507521600, 1, 2, 0.5, 1.5, 10]]}"#,
        );

        let series = source(dir.path()).fetch(&snapshot_request()).await.unwrap();
        assert_eq!(series.len(), 1);
    }
}
