//! Timeframe definitions for bar series.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Sampling interval of a bar series.
///
/// The fixed set `1min, 5min, 15min, 30min, 60min, day, week, month` is
/// available through [`Timeframe::standard`]; the generalized `{N}min` and
/// `{N}D` forms map onto [`Timeframe::Minutes`] and [`Timeframe::Days`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    /// N-minute bars
    Minutes(u32),
    /// N-day bars, `Days(1)` is the plain daily series
    Days(u32),
    /// ISO-week bars
    Week,
    /// Calendar-month bars
    Month,
}

impl Timeframe {
    /// Daily bars.
    pub const DAY: Timeframe = Timeframe::Days(1);

    /// The fixed timeframe enumeration.
    pub fn standard() -> &'static [Timeframe] {
        &[
            Timeframe::Minutes(1),
            Timeframe::Minutes(5),
            Timeframe::Minutes(15),
            Timeframe::Minutes(30),
            Timeframe::Minutes(60),
            Timeframe::DAY,
            Timeframe::Week,
            Timeframe::Month,
        ]
    }

    /// Check if this is an intraday timeframe.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Timeframe::Minutes(_))
    }

    /// Check if this is the plain daily timeframe.
    pub fn is_daily(&self) -> bool {
        *self == Timeframe::DAY
    }

    /// Nominal duration in seconds. Months are approximated as 30 days.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::Minutes(n) => u64::from(*n) * 60,
            Timeframe::Days(n) => u64::from(*n) * 86_400,
            Timeframe::Week => 604_800,
            Timeframe::Month => 2_592_000,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::DAY
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minutes(n) => write!(f, "{}min", n),
            Timeframe::Days(1) => write!(f, "day"),
            Timeframe::Days(n) => write!(f, "{}D", n),
            Timeframe::Week => write!(f, "week"),
            Timeframe::Month => write!(f, "month"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DataError::InvalidTimeframe(s.to_string());

        // Case matters for the single-letter month alias.
        if trimmed == "1M" {
            return Ok(Timeframe::Month);
        }

        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "minute" | "1m" => return Ok(Timeframe::Minutes(1)),
            "hour" | "1h" | "1hour" => return Ok(Timeframe::Minutes(60)),
            "4h" | "4hour" => return Ok(Timeframe::Minutes(240)),
            "day" | "daily" | "1d" => return Ok(Timeframe::DAY),
            "week" | "weekly" | "1w" => return Ok(Timeframe::Week),
            "month" | "monthly" => return Ok(Timeframe::Month),
            _ => {}
        }

        let parse_amount = |digits: &str| -> Result<u32, DataError> {
            match digits.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(invalid()),
            }
        };

        if let Some(digits) = lower.strip_suffix("min") {
            return parse_amount(digits).map(Timeframe::Minutes);
        }
        if let Some(digits) = lower.strip_suffix('d') {
            return parse_amount(digits).map(Timeframe::Days);
        }

        Err(invalid())
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
