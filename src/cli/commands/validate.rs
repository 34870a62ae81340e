//! Validate configuration command.

use anyhow::Result;
use ohlcv_config::load_config;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.pipeline.to_pipeline_config() {
        println!("Pipeline settings error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!(
        "Session: {} - {}",
        config.pipeline.rth_open, config.pipeline.rth_close
    );
    println!("Holidays: {}", config.pipeline.holidays.len());
    println!(
        "Streaks: {} (window {})",
        config.pipeline.streaks, config.pipeline.streak_window
    );
    println!("Timezone: {}", config.sources.timezone);
    println!("CSV paths: {}", config.sources.csv.paths.join(", "));
    println!("JSON paths: {}", config.sources.json.paths.join(", "));
    println!("Alpaca feed: {}", config.sources.alpaca.feed);
    println!(
        "Batch: {} at a time, {}s timeout",
        config.batch.concurrency, config.batch.timeout_secs
    );

    Ok(())
}
