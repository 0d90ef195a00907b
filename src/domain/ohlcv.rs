//! Daily OHLC bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcvBar {
    /// (open + close) / 2
    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

/// Which price of a bar a strategy trades at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceBasis {
    #[default]
    Close,
    Midpoint,
}

impl PriceBasis {
    pub fn price(&self, bar: &OhlcvBar) -> f64 {
        match self {
            PriceBasis::Close => bar.close,
            PriceBasis::Midpoint => bar.midpoint(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "close" => Some(PriceBasis::Close),
            "midpoint" | "blended" => Some(PriceBasis::Midpoint),
            _ => None,
        }
    }
}
