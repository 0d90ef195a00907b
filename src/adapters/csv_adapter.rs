//! CSV price cache adapter.
//!
//! Reads `<data_dir>/<CODE>.csv`. Columns are located by header name, case
//! insensitive; the date column is `date` or, failing that, the first column.
//! Only the first ten characters of a date cell are parsed, so timestamps
//! such as `2020-01-02 00:00:00-05:00` are accepted.

use crate::domain::error::TrendfolioError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::history_port::{DateRange, HistoryPort};
use chrono::NaiveDate;
use std::fs::File;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord, path: &str) -> Result<Self, TrendfolioError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| TrendfolioError::DataFormat {
                    reason: format!("{}: missing {} column", path, name),
                })
        };
        Ok(Columns {
            date: find("date").unwrap_or(0),
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}

fn parse_price(value: &str, column: &str, line: u64) -> Result<f64, TrendfolioError> {
    value.parse().map_err(|e| TrendfolioError::DataFormat {
        reason: format!("line {}: invalid {} value '{}': {}", line, column, value, e),
    })
}

impl HistoryPort for CsvAdapter {
    fn fetch_history(&self, code: &str, range: DateRange) -> Result<Vec<OhlcvBar>, TrendfolioError> {
        let path = self.csv_path(code);
        let display = path.display().to_string();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrendfolioError::NoData {
                    code: code.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);
        let headers = rdr.headers().map_err(|e| TrendfolioError::DataFormat {
            reason: format!("{}: {}", display, e),
        })?;
        let cols = Columns::locate(headers, &display)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TrendfolioError::DataFormat {
                reason: format!("{}: CSV parse error: {}", display, e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let date_cell = field(&record, cols.date);
            let date_str = date_cell.get(..10).unwrap_or(date_cell);
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                TrendfolioError::DataFormat {
                    reason: format!("{} line {}: invalid date '{}': {}", display, line, date_cell, e),
                }
            })?;
            if !range.contains(date) {
                continue;
            }

            let prices = [cols.open, cols.high, cols.low, cols.close].map(|i| field(&record, i));
            if prices.iter().any(|p| p.is_empty()) {
                debug!(code, %date, "skipping row with missing prices");
                continue;
            }

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: parse_price(prices[0], "open", line)?,
                high: parse_price(prices[1], "high", line)?,
                low: parse_price(prices[2], "low", line)?,
                close: parse_price(prices[3], "close", line)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
