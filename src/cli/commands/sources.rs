//! List source connectors command.

use anyhow::Result;
use ohlcv_sources::available_sources;

pub async fn run() -> Result<()> {
    println!("Available Sources");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for key in available_sources() {
        println!("  {}", key);
    }

    println!();
    println!("Use --source <key> with the download command.");

    Ok(())
}
