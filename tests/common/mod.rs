#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use trendfolio::domain::backtest::TrendResult;
use trendfolio::domain::code_data::{CodeData, TrendFilter};
use trendfolio::domain::engine::{PortfolioConfig, PortfolioResult};
use trendfolio::domain::error::TrendfolioError;
use trendfolio::domain::metrics::Metrics;
pub use trendfolio::domain::ohlcv::OhlcvBar;
use trendfolio::domain::risk::RiskLimits;
use trendfolio::ports::history_port::{DateRange, HistoryPort};
use trendfolio::ports::report_port::ReportPort;

pub struct MockHistoryPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockHistoryPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl HistoryPort for MockHistoryPort {
    fn fetch_history(&self, code: &str, range: DateRange) -> Result<Vec<OhlcvBar>, TrendfolioError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(TrendfolioError::DataFormat {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| bars.iter().filter(|b| range.contains(b.date)).cloned().collect())
            .unwrap_or_default())
    }
}

/// Records what was reported instead of writing it.
#[derive(Default)]
pub struct RecordingReport {
    pub portfolio_runs: RefCell<Vec<(f64, Metrics)>>,
    pub trend_runs: RefCell<Vec<(String, Metrics)>>,
}

impl ReportPort for RecordingReport {
    fn write_portfolio(&self, result: &PortfolioResult, metrics: &Metrics) -> Result<(), TrendfolioError> {
        self.portfolio_runs
            .borrow_mut()
            .push((result.final_equity, metrics.clone()));
        Ok(())
    }

    fn write_trend(&self, result: &TrendResult, metrics: &Metrics) -> Result<(), TrendfolioError> {
        self.trend_runs
            .borrow_mut()
            .push((result.code.clone(), metrics.clone()));
        Ok(())
    }
}

pub fn make_bar(code: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close,
        low: close,
        close,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Flat bars (open = high = low = close) from a list of closes, one per day.
pub fn bars_from_closes(code: &str, start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            code: code.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
        })
        .collect()
}

/// Closes rising by one per day from `start_price`.
pub fn generate_bars(code: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    bars_from_closes(code, start_date, &closes)
}

pub fn make_code_data(code: &str, bars: Vec<OhlcvBar>) -> CodeData {
    CodeData::new(code.to_string(), bars)
}

/// Short averages so a handful of rising bars count as an uptrend.
pub fn fast_config() -> PortfolioConfig {
    PortfolioConfig {
        initial_capital: 1000.0,
        warmup: 4,
        risk: RiskLimits::default(),
        trend: TrendFilter {
            fast: 2,
            mid: 3,
            slow: 4,
        },
    }
}
