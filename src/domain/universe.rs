//! Instrument universe: code list parsing and history loading.

use crate::domain::code_data::CodeData;
use crate::domain::error::TrendfolioError;
use crate::ports::history_port::{DateRange, HistoryPort};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for TrendfolioError {
    fn from(err: UniverseError) -> Self {
        TrendfolioError::invalid("backtest", "codes", err.to_string())
    }
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Fetch every instrument, in the given order. Any instrument without a
/// single bar in range aborts the load.
pub fn load_histories(
    port: &dyn HistoryPort,
    codes: &[String],
    range: DateRange,
) -> Result<Vec<CodeData>, TrendfolioError> {
    let mut loaded = Vec::with_capacity(codes.len());

    for code in codes {
        let mut bars = port.fetch_history(code, range)?;
        if bars.is_empty() {
            return Err(TrendfolioError::NoData { code: code.clone() });
        }
        // stable, so repeated dates keep their file order
        bars.sort_by_key(|b| b.date);
        info!(
            code = %code,
            bars = bars.len(),
            first = %bars[0].date,
            last = %bars[bars.len() - 1].date,
            "history loaded"
        );
        loaded.push(CodeData::new(code.clone(), bars));
    }

    Ok(loaded)
}
