//! Plain-text report adapter implementing ReportPort.
//!
//! The summary goes to stdout when enabled. The log file gets the same
//! summary followed by every trade line; the per-instrument directory gets
//! one `<CODE>_backtest.log` per instrument.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::backtest::TrendResult;
use crate::domain::engine::PortfolioResult;
use crate::domain::error::TrendfolioError;
use crate::domain::metrics::Metrics;
use crate::domain::trade_log::{TradeEvent, TradeLog};
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub show_trades: bool,
    /// Number of most recent trades shown in the summary.
    pub log_limit: usize,
    pub log_path: Option<PathBuf>,
    pub per_ticker_log_dir: Option<PathBuf>,
    pub print_to_console: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            show_trades: true,
            log_limit: 80,
            log_path: None,
            per_ticker_log_dir: None,
            print_to_console: true,
        }
    }
}

pub struct TextReportAdapter {
    options: ReportOptions,
}

pub fn format_trade_line(event: &TradeEvent) -> String {
    let mut line = format!(
        "{} | {:4} | {:5} | price {:8.2} | value {:9.2} | avg cost {:8.4}",
        event.date,
        event.action,
        event.code,
        event.price,
        event.holding_value(),
        event.avg_cost_after,
    );
    if let (Some(pct), Some(profit)) = (event.profit_pct(), event.realized_profit) {
        let _ = write!(line, " | return {:6.2}% | profit {:8.2}", pct, profit);
    }
    let _ = write!(line, " | {}", event.reason);
    line
}

fn metrics_block(out: &mut String, metrics: &Metrics) {
    let _ = writeln!(out, "Total return : {:.2}%", metrics.total_return * 100.0);
    let _ = writeln!(out, "Annualized   : {:.2}%", metrics.annualized_return * 100.0);
    let _ = writeln!(
        out,
        "Max drawdown : -{:.2}% ({} days)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    let _ = writeln!(
        out,
        "Closed trades: {} won, {} lost ({:.1}% win rate)",
        metrics.trades_won,
        metrics.trades_lost,
        metrics.win_rate * 100.0
    );
}

fn recent_trades_block(out: &mut String, log: &TradeLog, options: &ReportOptions) {
    if !options.show_trades || options.log_limit == 0 || log.is_empty() {
        return;
    }
    let (recent, skipped) = log.recent(options.log_limit);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Recent trades (up to {}, {} older omitted)",
        options.log_limit, skipped
    );
    for event in recent {
        let _ = writeln!(out, "{}", format_trade_line(event));
    }
}

pub fn render_portfolio_summary(
    result: &PortfolioResult,
    metrics: &Metrics,
    options: &ReportOptions,
) -> String {
    let codes = result.portfolio.codes();
    let mut out = String::new();
    let _ = writeln!(out, "Strategy     : Multi-asset portfolio ({})", codes.join(", "));
    let _ = writeln!(
        out,
        "End date     : {}",
        result
            .end_date
            .map_or_else(|| "n/a".to_string(), |d| d.to_string())
    );
    let _ = writeln!(out, "Final equity : {:.2}", result.final_equity);
    let _ = writeln!(out, "Cash         : {:.2}", result.portfolio.cash);
    for holding in result.holdings() {
        let _ = writeln!(
            out,
            "- Holding {}: value {:.2} ({:.2}%)",
            holding.code, holding.value, holding.allocation_pct
        );
    }
    metrics_block(&mut out, metrics);

    let _ = writeln!(out);
    let _ = writeln!(out, "Trade counts");
    for code in codes {
        let c = result.trade_log.counts(code);
        let _ = writeln!(out, "  {:5}: {} buys, {} sells, {} exits", code, c.buys, c.sells, c.exits);
    }

    recent_trades_block(&mut out, &result.trade_log, options);
    out
}

pub fn render_trend_summary(result: &TrendResult, metrics: &Metrics, options: &ReportOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Strategy     : {} ({})", result.rule_name, result.code);
    let _ = writeln!(out, "Trade returns, ascending");
    for ret in result.sorted_returns() {
        let _ = writeln!(out, "  {:>7.2}%", ret);
    }
    if let Some(open) = &result.open_position {
        let _ = writeln!(
            out,
            "Open position: entry {:.2}, last {:.2} ({:.2}%)",
            open.entry_price,
            open.last_price,
            open.return_pct()
        );
    }
    let date = |d: Option<chrono::NaiveDate>| d.map_or_else(|| "n/a".to_string(), |d| d.to_string());
    let _ = writeln!(out, "Opening date : {}", date(result.first_date));
    let _ = writeln!(out, "Closing date : {}", date(result.last_date));
    let _ = writeln!(out, "Final balance: {:.2}", result.final_equity);
    let _ = writeln!(out, "Buy and hold : {:.2}", result.benchmark_equity);
    let _ = writeln!(
        out,
        "Verdict      : {}",
        if result.beats_benchmark() { "WIN" } else { "LOSE" }
    );
    metrics_block(&mut out, metrics);
    recent_trades_block(&mut out, &result.trade_log, options);
    out
}

fn ensure_parent(path: &Path) -> Result<(), TrendfolioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl TextReportAdapter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    fn print(&self, summary: &str) -> Result<(), TrendfolioError> {
        if self.options.print_to_console {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(summary.as_bytes())?;
            stdout.flush()?;
        }
        Ok(())
    }

    fn write_log_file(&self, summary: &str, log: &TradeLog) -> Result<(), TrendfolioError> {
        let Some(path) = &self.options.log_path else {
            return Ok(());
        };
        ensure_parent(path)?;

        let mut content = String::from("Backtest complete\n");
        content.push_str(summary);
        if self.options.show_trades && !log.is_empty() {
            content.push_str("\nFull trade history\n");
            for event in log.events() {
                content.push_str(&format_trade_line(event));
                content.push('\n');
            }
        }
        fs::write(path, content)?;
        info!(path = %path.display(), "log file written");
        Ok(())
    }

    fn write_per_ticker(&self, codes: &[String], log: &TradeLog) -> Result<(), TrendfolioError> {
        let Some(dir) = &self.options.per_ticker_log_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;

        for code in codes {
            let mut content = format!("{} trade history\n", code);
            let mut any = false;
            if self.options.show_trades {
                for event in log.for_code(code) {
                    content.push_str(&format_trade_line(event));
                    content.push('\n');
                    any = true;
                }
            }
            if !any {
                content.push_str("no trades\n");
            }
            fs::write(dir.join(format!("{}_backtest.log", code)), content)?;
        }
        info!(dir = %dir.display(), instruments = codes.len(), "per-instrument logs written");
        Ok(())
    }
}

impl ReportPort for TextReportAdapter {
    fn write_portfolio(&self, result: &PortfolioResult, metrics: &Metrics) -> Result<(), TrendfolioError> {
        let summary = render_portfolio_summary(result, metrics, &self.options);
        self.print(&summary)?;
        self.write_log_file(&summary, &result.trade_log)?;
        self.write_per_ticker(result.portfolio.codes(), &result.trade_log)
    }

    fn write_trend(&self, result: &TrendResult, metrics: &Metrics) -> Result<(), TrendfolioError> {
        let summary = render_trend_summary(result, metrics, &self.options);
        self.print(&summary)?;
        self.write_log_file(&summary, &result.trade_log)?;
        self.write_per_ticker(std::slice::from_ref(&result.code), &result.trade_log)
    }
}
