//! Weekday trading calendar.

use chrono::{Datelike, NaiveDate, Weekday};
use ohlcv_core::TradingCalendar;
use std::collections::BTreeSet;

/// Monday to Friday sessions, minus an explicit holiday list.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    /// Calendar without holidays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calendar closed on the given dates.
    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Number of configured holidays.
    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}
