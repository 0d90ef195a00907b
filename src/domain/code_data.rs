//! Per-instrument history, precomputed indicators and the unified calendar.

use crate::domain::indicator::{compute_indicators, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct CodeData {
    pub code: String,
    pub ohlcv: Vec<OhlcvBar>,
    pub indicators: HashMap<IndicatorType, IndicatorSeries>,
    /// Date → bar index. A date repeated in the series maps to its last bar.
    pub date_index: HashMap<NaiveDate, usize>,
    /// Precomputed uptrend flag per bar; empty means never trending.
    pub uptrend: Vec<bool>,
}

impl CodeData {
    pub fn new(code: String, ohlcv: Vec<OhlcvBar>) -> Self {
        let date_index = ohlcv
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            ohlcv,
            indicators: HashMap::new(),
            date_index,
            uptrend: Vec::new(),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.ohlcv.len()
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Indicator value at `index`, `None` when missing or still warming up.
    pub fn indicator(&self, indicator_type: IndicatorType, index: usize) -> Option<f64> {
        self.indicators.get(&indicator_type)?.get(index)
    }

    pub fn is_uptrend(&self, index: usize) -> bool {
        self.uptrend.get(index).copied().unwrap_or(false)
    }

    pub fn add_indicators(&mut self, types: &[IndicatorType]) {
        let missing: Vec<IndicatorType> = types
            .iter()
            .copied()
            .filter(|t| !self.indicators.contains_key(t))
            .collect();
        self.indicators
            .extend(compute_indicators(&self.ohlcv, &missing));
    }
}

/// Moving-average ordering that defines an uptrend:
/// `SMA(slow) < SMA(mid) < SMA(fast) < low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendFilter {
    pub fast: usize,
    pub mid: usize,
    pub slow: usize,
}

impl Default for TrendFilter {
    fn default() -> Self {
        TrendFilter {
            fast: 50,
            mid: 150,
            slow: 200,
        }
    }
}

impl TrendFilter {
    pub fn indicator_types(&self) -> [IndicatorType; 3] {
        [
            IndicatorType::Sma(self.fast),
            IndicatorType::Sma(self.mid),
            IndicatorType::Sma(self.slow),
        ]
    }

    pub fn is_uptrend(&self, data: &CodeData, index: usize) -> bool {
        let (Some(fast), Some(mid), Some(slow)) = (
            data.indicator(IndicatorType::Sma(self.fast), index),
            data.indicator(IndicatorType::Sma(self.mid), index),
            data.indicator(IndicatorType::Sma(self.slow), index),
        ) else {
            return false;
        };
        let low = data.ohlcv[index].low;
        slow < mid && mid < fast && fast < low
    }
}

/// Flags are false inside the first `warmup` bars and wherever an average is undefined.
pub fn compute_uptrend_flags(data: &mut CodeData, filter: &TrendFilter, warmup: usize) {
    data.add_indicators(&filter.indicator_types());
    let flags: Vec<bool> = (0..data.bar_count())
        .map(|i| i >= warmup && filter.is_uptrend(data, i))
        .collect();
    data.uptrend = flags;
}

pub fn build_unified_timeline(codes: &[CodeData]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = codes
        .iter()
        .flat_map(|cd| cd.ohlcv.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
