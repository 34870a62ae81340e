//! Trading calendar trait.

use chrono::NaiveDate;

/// Source of valid trading sessions.
pub trait TradingCalendar: Send + Sync {
    /// Check whether the exchange holds a session on `date`.
    fn is_session(&self, date: NaiveDate) -> bool;

    /// All session dates in `[from, to]`, inclusive on both ends.
    fn sessions(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| self.is_session(*d))
            .collect()
    }

    /// Number of sessions in `[from, to]`.
    fn session_count(&self, from: NaiveDate, to: NaiveDate) -> usize {
        self.sessions(from, to).len()
    }
}
