//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report::{ReportOptions, TextReportAdapter};
use crate::domain::backtest::{run_trend_backtest, BacktestConfig, TrendResult};
use crate::domain::code_data::{build_unified_timeline, TrendFilter};
use crate::domain::config_validation::{parse_date, validate_all};
use crate::domain::engine::{prepare_code_data, run_portfolio_backtest, PortfolioConfig, PortfolioResult};
use crate::domain::error::TrendfolioError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::PriceBasis;
use crate::domain::risk::RiskLimits;
use crate::domain::signal::{Breakout, MovingAverageRegime, RuleKind, SignalRule, RULE_NAMES};
use crate::domain::universe::{load_histories, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::history_port::{DateRange, HistoryPort};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "trendfolio", about = "Trend-following portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the multi-asset portfolio backtest
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated instrument codes, overriding [backtest] codes
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        log_path: Option<PathBuf>,
        #[arg(long)]
        per_ticker_log_dir: Option<PathBuf>,
        /// Do not print the summary to stdout
        #[arg(short, long)]
        quiet: bool,
    },
    /// Run a single-instrument trend strategy
    Trend {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        /// ma_regime or breakout, overriding [strategy] rule
        #[arg(long)]
        rule: Option<String>,
    },
    /// Validate a configuration file and print the resolved settings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Portfolio {
            config,
            codes,
            log_path,
            per_ticker_log_dir,
            quiet,
        } => run_portfolio(&config, codes.as_deref(), log_path, per_ticker_log_dir, quiet),
        Command::Trend { config, code, rule } => run_trend(&config, code.as_deref(), rule.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TrendfolioError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_all(&adapter)?;
    Ok(adapter)
}

fn run_portfolio(
    config_path: &Path,
    codes_override: Option<&str>,
    log_path: Option<PathBuf>,
    per_ticker_log_dir: Option<PathBuf>,
    quiet: bool,
) -> Result<(), TrendfolioError> {
    let adapter = load_config(config_path)?;
    let codes = resolve_codes(codes_override, &adapter)?;
    let range = build_date_range(&adapter)?;
    let config = build_portfolio_config(&adapter);

    let mut options = build_report_options(&adapter);
    if log_path.is_some() {
        options.log_path = log_path;
    }
    if per_ticker_log_dir.is_some() {
        options.per_ticker_log_dir = per_ticker_log_dir;
    }
    if quiet {
        options.print_to_console = false;
    }

    let history = CsvAdapter::new(data_dir(&adapter));
    let report = TextReportAdapter::new(options);
    run_portfolio_pipeline(&history, &report, &codes, range, &config)?;
    Ok(())
}

fn run_trend(config_path: &Path, code_override: Option<&str>, rule_override: Option<&str>) -> Result<(), TrendfolioError> {
    let adapter = load_config(config_path)?;
    let codes = resolve_codes(code_override, &adapter)?;
    if codes.len() > 1 {
        warn!(
            codes = %codes.join(","),
            "trend runs on one instrument, using {}",
            codes[0]
        );
    }
    let range = build_date_range(&adapter)?;
    let config = build_backtest_config(&adapter);
    let rule = build_rule(&adapter, rule_override)?;

    let history = CsvAdapter::new(data_dir(&adapter));
    let report = TextReportAdapter::new(build_report_options(&adapter));
    run_trend_pipeline(&history, &report, &codes[0], range, rule.as_rule(), &config)?;
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TrendfolioError> {
    let adapter = load_config(config_path)?;
    let codes = resolve_codes(None, &adapter)?;
    let range = build_date_range(&adapter)?;
    let portfolio = build_portfolio_config(&adapter);
    let trend = build_backtest_config(&adapter);
    let rule = build_rule(&adapter, None)?;
    let report = build_report_options(&adapter);
    let bound = |d: Option<chrono::NaiveDate>| d.map_or_else(|| "unbounded".to_string(), |d| d.to_string());

    eprintln!("Config validated successfully");
    eprintln!("\nUniverse:");
    eprintln!("  codes:     {}", codes.join(", "));
    eprintln!("  data_dir:  {}", data_dir(&adapter).display());
    eprintln!("  range:     {} .. {}", bound(range.start), bound(range.end));
    eprintln!("\nPortfolio:");
    eprintln!("  initial capital:      {:.2}", portfolio.initial_capital);
    eprintln!("  warmup:               {}", portfolio.warmup);
    eprintln!("  max alloc per ticker: {}", portfolio.risk.max_alloc_per_ticker);
    eprintln!("  tranche fraction:     {}", portfolio.risk.tranche_fraction);
    eprintln!("  trailing stop:        {}", portfolio.risk.trailing_stop_pct);
    eprintln!("  risk cutoff:          {}", portfolio.risk.risk_cutoff_fraction);
    eprintln!(
        "  trend filter:         SMA({}) < SMA({}) < SMA({}) < low",
        portfolio.trend.slow, portfolio.trend.mid, portfolio.trend.fast
    );
    eprintln!("\nTrend strategy:");
    eprintln!("  rule:            {}", rule.as_rule().name());
    eprintln!("  initial capital: {:.2}", trend.initial_capital);
    let indicators: Vec<String> = rule
        .as_rule()
        .required_indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    eprintln!("  indicators:      {}", indicators.join(", "));
    eprintln!("\nReport:");
    eprintln!("  show trades: {} (last {})", report.show_trades, report.log_limit);
    if let Some(path) = &report.log_path {
        eprintln!("  log file:    {}", path.display());
    }
    if let Some(dir) = &report.per_ticker_log_dir {
        eprintln!("  per ticker:  {}", dir.display());
    }
    Ok(())
}

pub fn run_portfolio_pipeline(
    history: &dyn HistoryPort,
    report: &dyn ReportPort,
    codes: &[String],
    range: DateRange,
    config: &PortfolioConfig,
) -> Result<PortfolioResult, TrendfolioError> {
    let mut data = load_histories(history, codes, range)?;
    for cd in &data {
        if cd.bar_count() <= config.warmup {
            warn!(
                code = %cd.code,
                bars = cd.bar_count(),
                warmup = config.warmup,
                "history shorter than warmup, instrument will never trend"
            );
        }
    }
    prepare_code_data(&mut data, config);

    let timeline = build_unified_timeline(&data);
    info!(codes = data.len(), dates = timeline.len(), "running portfolio backtest");
    let result = run_portfolio_backtest(&data, &timeline, config);

    let metrics = Metrics::from_trade_log(
        result.portfolio.initial_capital,
        &result.portfolio.equity_curve,
        &result.trade_log,
    );
    report.write_portfolio(&result, &metrics)?;
    Ok(result)
}

pub fn run_trend_pipeline(
    history: &dyn HistoryPort,
    report: &dyn ReportPort,
    code: &str,
    range: DateRange,
    rule: &dyn SignalRule,
    config: &BacktestConfig,
) -> Result<TrendResult, TrendfolioError> {
    let mut loaded = load_histories(history, &[code.to_string()], range)?;
    let Some(mut data) = loaded.pop() else {
        return Err(TrendfolioError::NoData { code: code.to_string() });
    };
    if data.bar_count() <= config.warmup {
        warn!(
            code,
            bars = data.bar_count(),
            warmup = config.warmup,
            "history shorter than warmup, no trades will be made"
        );
    }
    data.add_indicators(&rule.required_indicators());

    info!(code, rule = rule.name(), bars = data.bar_count(), "running trend backtest");
    let result = run_trend_backtest(&data, rule, config);

    let realized: Vec<f64> = result
        .trade_log
        .events()
        .iter()
        .filter_map(|e| e.realized_profit)
        .collect();
    let metrics = Metrics::compute(result.initial_capital, &result.equity_curve, &realized);
    report.write_trend(&result, &metrics)?;
    Ok(result)
}

fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("backtest", "data_dir")
            .unwrap_or_else(|| "data".to_string()),
    )
}

pub fn build_date_range(config: &dyn ConfigPort) -> Result<DateRange, TrendfolioError> {
    Ok(DateRange {
        start: parse_date(config, "start_date")?,
        end: parse_date(config, "end_date")?,
    })
}

pub fn build_portfolio_config(config: &dyn ConfigPort) -> PortfolioConfig {
    let defaults = PortfolioConfig::default();
    let risk = RiskLimits::default();
    let trend = TrendFilter::default();

    PortfolioConfig {
        initial_capital: config.get_double("backtest", "initial_capital", defaults.initial_capital),
        warmup: config.get_count("backtest", "warmup", defaults.warmup),
        risk: RiskLimits {
            max_alloc_per_ticker: config.get_double("risk", "max_alloc_per_ticker", risk.max_alloc_per_ticker),
            tranche_fraction: config.get_double("risk", "tranche_fraction", risk.tranche_fraction),
            trailing_stop_pct: config.get_double("risk", "trailing_stop_pct", risk.trailing_stop_pct),
            risk_cutoff_fraction: config.get_double("risk", "risk_cutoff_fraction", risk.risk_cutoff_fraction),
        },
        trend: TrendFilter {
            fast: config.get_count("trend", "fast_window", trend.fast),
            mid: config.get_count("trend", "mid_window", trend.mid),
            slow: config.get_count("trend", "slow_window", trend.slow),
        },
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let defaults = BacktestConfig::default();
    BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", defaults.initial_capital),
        warmup: config.get_count("backtest", "warmup", defaults.warmup),
    }
}

pub fn build_rule(config: &dyn ConfigPort, rule_override: Option<&str>) -> Result<RuleKind, TrendfolioError> {
    let name = rule_override
        .map(str::to_string)
        .or_else(|| config.get_string("strategy", "rule"))
        .unwrap_or_else(|| RULE_NAMES[0].to_string())
        .trim()
        .to_lowercase();

    match name.as_str() {
        "ma_regime" => {
            let d = MovingAverageRegime::default();
            let basis = config
                .get_string("strategy", "price_basis")
                .and_then(|s| PriceBasis::parse(&s))
                .unwrap_or(d.basis);
            Ok(RuleKind::MovingAverageRegime(MovingAverageRegime {
                window: config.get_count("strategy", "ma_window", d.window),
                entry_buffer: config.get_double("strategy", "entry_buffer", d.entry_buffer),
                max_drawdown: config.get_double("strategy", "ma_max_drawdown", d.max_drawdown),
                basis,
            }))
        }
        "breakout" => {
            let d = Breakout::default();
            Ok(RuleKind::Breakout(Breakout {
                lookback: config.get_count("strategy", "breakout_lookback", d.lookback),
                max_drawdown: config.get_double("strategy", "breakout_max_drawdown", d.max_drawdown),
            }))
        }
        other => Err(TrendfolioError::invalid(
            "strategy",
            "rule",
            format!("unknown rule '{}', expected one of {}", other, RULE_NAMES.join(", ")),
        )),
    }
}

pub fn build_report_options(config: &dyn ConfigPort) -> ReportOptions {
    let d = ReportOptions::default();
    ReportOptions {
        show_trades: config.get_bool("report", "show_trades", d.show_trades),
        log_limit: config.get_count("report", "log_limit", d.log_limit),
        log_path: config
            .get_string("report", "log_path")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
        per_ticker_log_dir: config
            .get_string("report", "per_ticker_log_dir")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
        print_to_console: config.get_bool("report", "print_to_console", d.print_to_console),
    }
}

/// Instrument codes from the override flag, else `[backtest] codes`.
pub fn resolve_codes(code_override: Option<&str>, config: &dyn ConfigPort) -> Result<Vec<String>, TrendfolioError> {
    match code_override {
        Some(codes) => Ok(parse_codes(codes)?),
        None => {
            let codes = config
                .get_string("backtest", "codes")
                .ok_or_else(|| TrendfolioError::ConfigMissing {
                    section: "backtest".to_string(),
                    key: "codes".to_string(),
                })?;
            Ok(parse_codes(&codes)?)
        }
    }
}
