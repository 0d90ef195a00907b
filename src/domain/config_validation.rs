//! Configuration validation.
//!
//! Validates every config field before a run. Builders read the same keys
//! afterwards and may rely on them parsing.

use crate::domain::error::TrendfolioError;
use crate::domain::ohlcv::PriceBasis;
use crate::domain::signal::RULE_NAMES;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::{parse_bool, ConfigPort};
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    validate_codes(config)?;
    if read_double(config, "backtest", "initial_capital")?.is_some_and(|c| c <= 0.0) {
        return Err(TrendfolioError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    read_count(config, "backtest", "warmup")?;
    validate_dates(config)?;
    if config
        .get_string("backtest", "data_dir")
        .is_some_and(|dir| dir.trim().is_empty())
    {
        return Err(TrendfolioError::invalid("backtest", "data_dir", "data_dir is empty"));
    }
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    validate_fraction(config, "risk", "max_alloc_per_ticker", false)?;
    validate_fraction(config, "risk", "tranche_fraction", false)?;
    validate_fraction(config, "risk", "trailing_stop_pct", true)?;
    validate_fraction(config, "risk", "risk_cutoff_fraction", false)?;
    Ok(())
}

pub fn validate_trend_config(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    for key in ["fast_window", "mid_window", "slow_window"] {
        validate_window(config, "trend", key)?;
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    if let Some(rule) = config.get_string("strategy", "rule") {
        let rule = rule.trim().to_lowercase();
        if !RULE_NAMES.contains(&rule.as_str()) {
            return Err(TrendfolioError::invalid(
                "strategy",
                "rule",
                format!("unknown rule '{}', expected one of {}", rule, RULE_NAMES.join(", ")),
            ));
        }
    }
    if config
        .get_string("strategy", "price_basis")
        .is_some_and(|basis| PriceBasis::parse(&basis).is_none())
    {
        return Err(TrendfolioError::invalid(
            "strategy",
            "price_basis",
            "price_basis must be close or midpoint",
        ));
    }
    validate_window(config, "strategy", "ma_window")?;
    validate_window(config, "strategy", "breakout_lookback")?;
    if read_double(config, "strategy", "entry_buffer")?.is_some_and(|b| b < 0.0) {
        return Err(TrendfolioError::invalid(
            "strategy",
            "entry_buffer",
            "entry_buffer must be non-negative",
        ));
    }
    validate_fraction(config, "strategy", "ma_max_drawdown", false)?;
    validate_fraction(config, "strategy", "breakout_max_drawdown", false)?;
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    read_count(config, "report", "log_limit")?;
    for key in ["show_trades", "print_to_console"] {
        let parses = config
            .get_string("report", key)
            .is_none_or(|value| parse_bool(&value).is_some());
        if !parses {
            return Err(TrendfolioError::invalid("report", key, "expected true or false"));
        }
    }
    Ok(())
}

/// Every section, in file order.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    validate_backtest_config(config)?;
    validate_risk_config(config)?;
    validate_trend_config(config)?;
    validate_strategy_config(config)?;
    validate_report_config(config)
}

fn read_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TrendfolioError> {
    config
        .get_string(section, key)
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| TrendfolioError::invalid(section, key, format!("'{}' is not a number", s.trim())))
        })
        .transpose()
}

fn read_count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<usize>, TrendfolioError> {
    config
        .get_string(section, key)
        .map(|s| {
            s.trim().parse::<usize>().map_err(|_| {
                TrendfolioError::invalid(section, key, format!("'{}' is not a non-negative integer", s.trim()))
            })
        })
        .transpose()
}

fn validate_window(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TrendfolioError> {
    if read_count(config, section, key)? == Some(0) {
        return Err(TrendfolioError::invalid(section, key, format!("{} must be at least 1", key)));
    }
    Ok(())
}

/// Fractions live in (0, 1]; with `allow_zero` the lower bound is inclusive.
fn validate_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    allow_zero: bool,
) -> Result<(), TrendfolioError> {
    let Some(value) = read_double(config, section, key)? else {
        return Ok(());
    };
    let low_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !low_ok || value > 1.0 {
        return Err(TrendfolioError::invalid(
            section,
            key,
            format!("{} must be a fraction between 0 and 1", key),
        ));
    }
    Ok(())
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    match config.get_string("backtest", "codes") {
        Some(codes) => {
            parse_codes(&codes)?;
            Ok(())
        }
        None => Err(TrendfolioError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TrendfolioError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(TrendfolioError::invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

pub fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<Option<NaiveDate>, TrendfolioError> {
    config
        .get_string("backtest", field)
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                TrendfolioError::invalid(
                    "backtest",
                    field,
                    format!("invalid {} format, expected YYYY-MM-DD", field),
                )
            })
        })
        .transpose()
}
