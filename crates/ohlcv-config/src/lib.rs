//! Configuration management.

mod settings;

pub use settings::{
    AlpacaConfig, AppConfig, AppSettings, BatchSettings, CsvSourceSettings, JsonSourceSettings,
    LoggingConfig, PipelineSettings, SettingsError, SourcesConfig,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Prefix of environment overrides, e.g. `OHLCV__BATCH__CONCURRENCY=8`.
pub const ENV_PREFIX: &str = "OHLCV";

/// Load configuration from file and environment.
///
/// A missing file is not an error; defaults and environment still apply.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.batch.concurrency, 4);
        assert_eq!(config.sources.timezone, "America/New_York");
        assert_eq!(config.pipeline.rth_open, "09:30");
        assert!(!config.pipeline.streaks);
    }

    #[test]
    fn test_toml_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
streaks = true
rth_close = "17:30"
holidays = ["2024-12-25"]

[sources.csv]
paths = ["data/csv"]
prefixes = ["NYS"]

[batch]
concurrency = 8
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();

        assert!(config.pipeline.streaks);
        assert_eq!(config.pipeline.rth_close, "17:30");
        assert_eq!(config.sources.csv.paths, vec!["data/csv".to_string()]);
        assert_eq!(config.sources.csv.prefixes, vec!["NYS".to_string()]);
        // Untouched keys keep their defaults
        assert_eq!(config.sources.csv.columns[0], "Date");
        assert_eq!(config.batch.concurrency, 8);
        assert_eq!(config.batch.timeout_secs, 120);
    }

    #[test]
    fn test_pipeline_conversion() {
        let settings = PipelineSettings {
            rth_open: "09:00".to_string(),
            rth_close: "17:30:00".to_string(),
            holidays: vec!["2024-12-25".to_string()],
            ..Default::default()
        };

        let pipeline = settings.to_pipeline_config().unwrap();
        assert_eq!(pipeline.session.open.format("%H:%M").to_string(), "09:00");
        assert_eq!(pipeline.session.close.format("%H:%M").to_string(), "17:30");
        assert_eq!(pipeline.holidays.len(), 1);
        assert_eq!(pipeline.streak_window, 10);
    }

    #[test]
    fn test_pipeline_conversion_rejects_bad_values() {
        let settings = PipelineSettings {
            rth_open: "9.30".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.to_pipeline_config(),
            Err(SettingsError::InvalidTime(_))
        ));

        let settings = PipelineSettings {
            rth_open: "16:00".to_string(),
            rth_close: "09:30".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.to_pipeline_config(),
            Err(SettingsError::EmptySession { .. })
        ));

        let settings = PipelineSettings {
            holidays: vec!["Christmas".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            settings.to_pipeline_config(),
            Err(SettingsError::InvalidDate(_))
        ));
    }
}
