//! Price history access port trait.

use crate::domain::error::TrendfolioError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Inclusive date bounds; an open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

pub trait HistoryPort {
    /// Daily bars for `code` in chronological order, restricted to `range`.
    fn fetch_history(&self, code: &str, range: DateRange) -> Result<Vec<OhlcvBar>, TrendfolioError>;
}
