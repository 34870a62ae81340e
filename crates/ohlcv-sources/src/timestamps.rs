//! Timestamp parsing and timezone normalization.
//!
//! Series timestamps are exchange-local and timezone-naive. Anything that
//! carries an offset, and epoch seconds, is converted to the reference
//! timezone first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use ohlcv_core::DataError;
use serde::{Deserialize, Serialize};

/// How timestamps are written in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// ISO-8601 style strings, with or without offset
    #[default]
    Iso,
    /// Unix epoch seconds (milliseconds are detected by magnitude)
    Epoch,
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Parse an IANA timezone name such as "America/New_York".
pub fn parse_timezone(name: &str) -> Result<Tz, DataError> {
    name.parse::<Tz>()
        .map_err(|_| DataError::Parse(format!("Unknown timezone: {}", name)))
}

/// Wall-clock time of `utc` in `tz`.
pub fn to_local(utc: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    utc.with_timezone(&tz).naive_local()
}

/// Wall-clock time in `tz` of a Unix timestamp in seconds.
pub fn epoch_to_local(secs: i64, tz: Tz) -> Result<NaiveDateTime, DataError> {
    DateTime::from_timestamp(secs, 0)
        .map(|utc| to_local(utc, tz))
        .ok_or_else(|| DataError::Parse(format!("Epoch out of range: {}", secs)))
}

/// Parse one timestamp cell.
pub fn parse_timestamp(
    raw: &str,
    format: TimestampFormat,
    tz: Tz,
) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    match format {
        TimestampFormat::Epoch => parse_epoch(raw, tz),
        TimestampFormat::Iso => parse_iso(raw, tz),
    }
}

fn parse_epoch(raw: &str, tz: Tz) -> Result<NaiveDateTime, DataError> {
    let secs = match raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => raw
            .parse::<f64>()
            .map(|v| v as i64)
            .map_err(|_| DataError::Parse(format!("Could not parse epoch: {}", raw)))?,
    };

    // Anything past year 2286 in seconds is taken as milliseconds
    let secs = if secs.abs() > 10_000_000_000 { secs / 1000 } else { secs };
    epoch_to_local(secs, tz)
}

fn parse_iso(raw: &str, tz: Tz) -> Result<NaiveDateTime, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(to_local(dt.with_timezone(&Utc), tz));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(to_local(dt.with_timezone(&Utc), tz));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Ok(d.and_hms_opt(0, 0, 0).unwrap_or_default());
        }
    }

    Err(DataError::Parse(format!("Could not parse date: {}", raw)))
}

/// Parse a numeric cell; empty cells are missing values.
pub fn parse_number(raw: &str) -> Result<f64, DataError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|_| DataError::Parse(format!("Could not parse number: {}", raw)))
}
