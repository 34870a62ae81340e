//! Connector factory.

use ohlcv_config::SourcesConfig;
use ohlcv_core::{DataError, SourceConnector};
use ohlcv_transform::PostProcessPipeline;
use std::path::PathBuf;
use std::sync::Arc;

use crate::alpaca::{AlpacaCredentials, AlpacaSource};
use crate::csv_source::{ColumnMap, CsvSource};
use crate::json_source::JsonSource;
use crate::timestamps::{parse_timezone, TimestampFormat};

/// File-name prefixes of Infront exports.
const INFRONT_PREFIXES: [&str; 4] = ["NSQ", "NYS", "NYSF", "SSE"];

const TRADINGVIEW_COLUMNS: [&str; 6] = ["time", "open", "high", "low", "close", "volume"];
const ALPHAVANTAGE_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];
const ALPACA_FILE_KEYS: [&str; 6] = [
    "startEpochTime",
    "openPrice",
    "highPrice",
    "lowPrice",
    "closePrice",
    "volume",
];
const ALPACA_FILE_V2_KEYS: [&str; 6] = ["DateTime", "Open", "High", "Low", "Close", "Volume"];

/// Keys accepted by [`make_connector`].
pub fn available_sources() -> &'static [&'static str] {
    &[
        "csv",
        "tradingview",
        "alphavantage",
        "infront",
        "json",
        "alpaca-file",
        "alpaca-file-v2",
        "alpaca",
    ]
}

/// Build the connector registered under `key`.
///
/// Every connector gets its own clone of `pipeline`.
pub fn make_connector(
    key: &str,
    config: &SourcesConfig,
    pipeline: PostProcessPipeline,
) -> Result<Arc<dyn SourceConnector>, DataError> {
    let tz = parse_timezone(&config.timezone)?;
    let csv_paths = || config.csv.paths.iter().map(PathBuf::from).collect::<Vec<_>>();
    let json_paths = || config.json.paths.iter().map(PathBuf::from).collect::<Vec<_>>();

    let connector: Arc<dyn SourceConnector> = match key.to_ascii_lowercase().as_str() {
        "csv" => {
            let format = if config.csv.epoch {
                TimestampFormat::Epoch
            } else {
                TimestampFormat::Iso
            };
            Arc::new(
                CsvSource::new("csv", csv_paths(), pipeline)
                    .with_prefixes(config.csv.prefixes.clone())
                    .with_columns(ColumnMap::from_names(&config.csv.columns)?)
                    .with_format(format)
                    .with_timezone(tz),
            )
        }
        "tradingview" => Arc::new(
            CsvSource::new("tradingview", csv_paths(), pipeline)
                .with_columns(ColumnMap::from_names(&TRADINGVIEW_COLUMNS)?)
                .with_format(TimestampFormat::Epoch)
                .with_timezone(tz),
        ),
        "alphavantage" => Arc::new(
            CsvSource::new("alphavantage", csv_paths(), pipeline)
                .with_columns(ColumnMap::from_names(&ALPHAVANTAGE_COLUMNS)?)
                .with_format(TimestampFormat::Iso)
                .with_timezone(tz),
        ),
        "infront" => {
            let prefixes = if config.csv.prefixes.is_empty() {
                INFRONT_PREFIXES.iter().map(|p| p.to_string()).collect()
            } else {
                config.csv.prefixes.clone()
            };
            Arc::new(
                CsvSource::new("infront", csv_paths(), pipeline)
                    .with_prefixes(prefixes)
                    .with_timezone(tz),
            )
        }
        "json" => {
            let format = if config.json.epoch {
                TimestampFormat::Epoch
            } else {
                TimestampFormat::Iso
            };
            Arc::new(
                JsonSource::new(json_paths(), &config.json.keys, pipeline)?
                    .with_format(format)
                    .with_timezone(tz),
            )
        }
        "alpaca-file" => Arc::new(
            JsonSource::new(json_paths(), &ALPACA_FILE_KEYS, pipeline)?
                .with_name("alpaca-file")
                .with_format(TimestampFormat::Epoch)
                .with_timezone(tz),
        ),
        "alpaca-file-v2" => Arc::new(
            JsonSource::new(json_paths(), &ALPACA_FILE_V2_KEYS, pipeline)?
                .with_name("alpaca-file-v2")
                .with_format(TimestampFormat::Iso)
                .with_timezone(tz),
        ),
        "alpaca" => {
            let credentials = AlpacaCredentials::from_env(&config.alpaca)?;
            Arc::new(AlpacaSource::new(credentials, &config.alpaca, tz, pipeline)?)
        }
        "sql" | "ib" | "ibasync" | "tws" => {
            return Err(DataError::InvalidSource(format!(
                "{} connector is not supported",
                key
            )))
        }
        _ => return Err(DataError::InvalidSource(key.to_string())),
    };

    Ok(connector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ohlcv_core::{BarRequest, Timeframe};
    use ohlcv_transform::PipelineConfig;

    fn pipeline() -> PostProcessPipeline {
        PostProcessPipeline::new(PipelineConfig::default())
    }

    #[test]
    fn test_file_sources() {
        let config = SourcesConfig::default();
        for key in [
            "csv",
            "tradingview",
            "alphavantage",
            "infront",
            "json",
            "alpaca-file",
            "alpaca-file-v2",
        ] {
            let connector = make_connector(key, &config, pipeline()).unwrap();
            assert_eq!(connector.name(), key);
            assert_eq!(connector.max_concurrency(), None);
        }
    }

    #[test]
    fn test_unknown_sources() {
        let config = SourcesConfig::default();
        for key in ["sql", "quandl", ""] {
            let err = make_connector(key, &config, pipeline()).err().unwrap();
            assert!(matches!(err, DataError::InvalidSource(_)));
            assert!(err.is_config());
        }
    }

    #[test]
    fn test_bad_timezone() {
        let config = SourcesConfig {
            timezone: "Nowhere/Special".to_string(),
            ..Default::default()
        };
        assert!(make_connector("csv", &config, pipeline()).is_err());
    }

    #[test]
    fn test_listed_keys() {
        assert!(available_sources().contains(&"alpaca"));
        assert_eq!(available_sources().len(), 8);
    }

    fn write_day(dir: &std::path::Path, body: &str) {
        let sub = dir.join("day");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("SPY.json"), body).unwrap();
    }

    fn json_config(dir: &std::path::Path) -> SourcesConfig {
        let mut config = SourcesConfig::default();
        config.json.paths = vec![dir.display().to_string()];
        config
    }

    #[tokio::test]
    async fn test_alpaca_file_preset() {
        let dir = tempfile::tempdir().unwrap();
        // 2017-10-09 and 2017-10-10 at midnight in New York
        write_day(
            dir.path(),
            r#"{"SPY": [{"startEpochTime": 1507521600, "openPrice": 1, "highPrice": 2, "lowPrice": 0.5, "closePrice": 1.5, "volume": 10},
                        {"startEpochTime": 1507608000, "openPrice": 1.5, "highPrice": 2.5, "lowPrice": 1, "closePrice": 2, "volume": 12}]}"#,
        );

        let connector = make_connector("alpaca-file", &json_config(dir.path()), pipeline()).unwrap();
        let series = connector
            .fetch(&BarRequest::new("SPY", Timeframe::DAY))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().date(), NaiveDate::from_ymd_opt(2017, 10, 9).unwrap());
        assert_eq!(series.last().unwrap().volume, 12.0);
    }

    #[tokio::test]
    async fn test_alpaca_file_v2_preset() {
        let dir = tempfile::tempdir().unwrap();
        write_day(
            dir.path(),
            r#"{"SPY": [{"DateTime": "2017-10-09", "Open": 1, "High": 2, "Low": 0.5, "Close": 1.5, "Volume": 10},
                        {"DateTime": "2017-10-10", "Open": 1.5, "High": 2.5, "Low": 1, "Close": 2, "Volume": 12}]}"#,
        );

        let connector = make_connector("alpaca-file-v2", &json_config(dir.path()), pipeline()).unwrap();
        let series = connector
            .fetch(&BarRequest::new("SPY", Timeframe::DAY))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().date(), NaiveDate::from_ymd_opt(2017, 10, 10).unwrap());
        assert_eq!(series.last().unwrap().close, 2.0);
    }
}
