//! Download command implementation.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use ohlcv_config::AppConfig;
use ohlcv_core::{Bar, BarRequest, BarSeries};
use ohlcv_monitor::BatchReport;
use ohlcv_sources::{make_connector, BatchRunner, SNAPSHOTS_OPTION};
use ohlcv_transform::{PostProcessPipeline, TransformTable};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::DownloadArgs;

type DateRange = (Option<NaiveDate>, Option<NaiveDate>);

pub async fn run(args: DownloadArgs, config: &AppConfig) -> Result<()> {
    let symbols = match &args.file {
        Some(path) => read_symbols_file(path)?,
        None => normalize_symbols(&args.symbols),
    };
    if symbols.is_empty() {
        bail!("No symbols given. Use --symbols A,B or --file symbols.txt");
    }

    let transform = args.transform.unwrap_or(args.timeframe);
    if !TransformTable::supports(args.timeframe, transform) {
        bail!("Cannot transform {} data to {}", args.timeframe, transform);
    }

    let ranges = request_ranges(&args, whole_span(&args, config.pipeline.streaks))?;

    let pipeline = PostProcessPipeline::new(
        config
            .pipeline
            .to_pipeline_config()
            .context("Invalid pipeline settings")?,
    );
    let connector = make_connector(&args.source, &config.sources, pipeline)
        .with_context(|| format!("Failed to create source '{}'", args.source))?;

    let runner = BatchRunner::new(connector)
        .with_concurrency(args.concurrency.unwrap_or(config.batch.concurrency))
        .with_timeout(Duration::from_secs(config.batch.timeout_secs))
        .with_keep_alive(config.batch.keep_alive);

    let requests = build_requests(&symbols, &ranges, &args);
    info!(
        "Downloading {} symbols from {} in {} requests",
        symbols.len(),
        args.source,
        requests.len()
    );
    let outcome = runner.run(requests).await?;
    let failed_requests = outcome.failed_count();
    if failed_requests > 0 {
        warn!("{} of {} requests failed", failed_requests, outcome.requested);
    }

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory {:?}", args.out))?;

    let merged = merge_series(outcome.series);
    for series in merged.values() {
        if series.is_empty() {
            continue;
        }
        let path = write_csv(series, &args.out)?;
        info!("Wrote {} rows to {}", series.len(), path.display());
    }

    let delivered: Vec<BarSeries> = merged.into_values().collect();
    let report = BatchReport::new(&args.source, symbols.len(), &delivered)
        .with_failed_requests(failed_requests);
    for symbol in report.empty_symbols() {
        warn!("No rows for {}, nothing written", symbol);
    }
    print!("{}", report);

    Ok(())
}

/// Whether `--years` must become one request over the whole span.
///
/// Resampling and streak counters depend on neighbouring bars, so pieces
/// split at year ends would not join back into the same series.
fn whole_span(args: &DownloadArgs, streaks: bool) -> bool {
    streaks || args.transform.is_some_and(|t| t != args.timeframe)
}

/// Date ranges to request for every symbol.
fn request_ranges(args: &DownloadArgs, whole_span: bool) -> Result<Vec<DateRange>> {
    if args.years.is_empty() {
        return Ok(vec![(args.start, args.end)]);
    }

    let ranges = year_ranges(&args.years)?;
    if !whole_span {
        return Ok(ranges);
    }

    let start = ranges.iter().filter_map(|r| r.0).min();
    let end = ranges.iter().filter_map(|r| r.1).max();
    Ok(vec![(start, end)])
}

/// Trim, uppercase and de-duplicate symbols, keeping their order.
fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in raw {
        let s = s.as_ref().trim().to_uppercase();
        if !s.is_empty() && !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

/// One symbol per line; blank lines and `#` comments are skipped.
fn parse_symbols(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    normalize_symbols(&lines)
}

fn read_symbols_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read symbols file {:?}", path))?;
    Ok(parse_symbols(&text))
}

fn year_ranges(years: &[i32]) -> Result<Vec<DateRange>> {
    years
        .iter()
        .map(|&year| {
            let start = NaiveDate::from_ymd_opt(year, 1, 1);
            let end = NaiveDate::from_ymd_opt(year, 12, 31);
            match (start, end) {
                (Some(_), Some(_)) => Ok((start, end)),
                _ => bail!("Invalid year {}", year),
            }
        })
        .collect()
}

fn build_requests(
    symbols: &[String],
    ranges: &[DateRange],
    args: &DownloadArgs,
) -> Vec<BarRequest> {
    let transform = args.transform.unwrap_or(args.timeframe);
    symbols
        .iter()
        .flat_map(|symbol| {
            ranges.iter().map(move |&(start, end)| {
                BarRequest::new(symbol.as_str(), args.timeframe)
                    .with_transform(transform)
                    .with_range(start, end)
                    .with_rth_only(args.rth || !args.all_hours)
                    .with_graceful(args.graceful)
                    .with_extra(SNAPSHOTS_OPTION, serde_json::Value::Bool(args.snapshots))
            })
        })
        .collect()
}

/// Concatenate the per-year pieces of each symbol.
///
/// Pieces only exist when nothing depends on bars across a year end.
/// Overlapping timestamps keep the bar that arrived first.
fn merge_series(pieces: Vec<BarSeries>) -> BTreeMap<String, BarSeries> {
    let mut grouped: BTreeMap<String, (BarSeries, Vec<Bar>)> = BTreeMap::new();
    for piece in pieces {
        let symbol = piece.symbol.clone();
        let template = BarSeries::empty(piece.timeframe).with_symbol(&symbol);
        let entry = grouped
            .entry(symbol)
            .or_insert_with(|| (template, Vec::new()));
        entry.1.extend(piece.into_bars());
    }

    grouped
        .into_iter()
        .map(|(symbol, (template, bars))| {
            let series = BarSeries::new(template.timeframe, bars).with_symbol(&symbol);
            (symbol, series)
        })
        .collect()
}

fn cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Write `{SYMBOL}.csv` into `dir`.
fn write_csv(series: &BarSeries, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", series.symbol));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    let with_day = series.iter().any(|b| b.day.is_some());
    let with_streaks = series.iter().any(|b| b.streak.is_some());
    let date_format = if series.timeframe.is_intraday() {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d"
    };

    let mut header = vec!["Date", "Open", "High", "Low", "Close", "Volume", "Ticker"];
    if with_day {
        header.push("Day");
    }
    if with_streaks {
        header.extend(["ConsOpen", "ConsHigh", "ConsLow", "ConsClose"]);
    }
    writer.write_record(&header)?;

    for bar in series.iter() {
        let mut record = vec![
            bar.timestamp.format(date_format).to_string(),
            cell(bar.open),
            cell(bar.high),
            cell(bar.low),
            cell(bar.close),
            cell(bar.volume),
            series.symbol.clone(),
        ];
        if with_day {
            record.push(bar.day.map(|d| d.to_string()).unwrap_or_default());
        }
        if with_streaks {
            let s = bar.streak.unwrap_or_default();
            record.extend([s.open, s.high, s.low, s.close].map(|v| v.to_string()));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(path)
}
