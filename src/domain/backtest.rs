//! Single-instrument trend backtest.
//!
//! The position is either fully invested or flat. Every entry spends all
//! available cash and every exit sells everything, so the result compounds
//! trade by trade from the initial balance.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::code_data::CodeData;
use crate::domain::portfolio::{EquityPoint, Portfolio, PriceBook};
use crate::domain::signal::{PositionState, Signal, SignalRule};
use crate::domain::trade_log::{TradeAction, TradeEvent, TradeLog, TradeReason};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// First bar index the rule is consulted on.
    pub warmup: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100.0,
            warmup: 200,
        }
    }
}

/// A position still held at the end of the history.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub shares: f64,
    pub last_price: f64,
}

impl OpenPosition {
    pub fn return_pct(&self) -> f64 {
        percent_change(self.entry_price, self.last_price)
    }
}

#[derive(Debug, Clone)]
pub struct TrendResult {
    pub code: String,
    pub rule_name: String,
    pub trade_log: TradeLog,
    /// Percent return of each closed trade, in the order they closed.
    pub trade_returns: Vec<f64>,
    pub open_position: Option<OpenPosition>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Initial capital held from the first bar's open to the last bar's open.
    pub benchmark_equity: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl TrendResult {
    /// Closed and open trade returns, ascending.
    pub fn sorted_returns(&self) -> Vec<f64> {
        let mut returns = self.trade_returns.clone();
        if let Some(open) = &self.open_position {
            returns.push(open.return_pct());
        }
        returns.sort_by(f64::total_cmp);
        returns
    }

    pub fn beats_benchmark(&self) -> bool {
        self.final_equity > self.benchmark_equity
    }
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to / from - 1.0) * 100.0
    }
}

fn buy_and_hold(data: &CodeData, initial_capital: f64) -> f64 {
    match (data.ohlcv.first(), data.ohlcv.last()) {
        (Some(first), Some(last)) if first.open > 0.0 => initial_capital * last.open / first.open,
        _ => initial_capital,
    }
}

pub fn run_trend_backtest(
    data: &CodeData,
    rule: &dyn SignalRule,
    config: &BacktestConfig,
) -> TrendResult {
    let code = data.code.clone();
    let basis = rule.price_basis();
    // the rule owns the drawdown stop, so the ledger carries none
    let mut portfolio = Portfolio::new(config.initial_capital, std::slice::from_ref(&code), 0.0);
    let mut prices = PriceBook::new();
    let mut trade_log = TradeLog::new();
    let mut trade_returns = Vec::new();

    for index in config.warmup..data.bar_count() {
        let bar = &data.ohlcv[index];
        let price = basis.price(bar);
        prices.insert(code.clone(), price);

        let state = match portfolio.position_mut(&code) {
            Some(pos) => {
                pos.last_price = Some(price);
                pos.mark_to_market(price);
                PositionState {
                    retained: pos.is_held(),
                    entry_price: pos.avg_cost,
                    highest_price: pos.highest_price,
                }
            }
            None => PositionState::default(),
        };

        match rule.decide(data, index, &state) {
            Signal::Enter if !state.retained => {
                let cash = portfolio.cash;
                if let Some(fill) = portfolio.buy(&code, price, cash) {
                    debug!(date = %bar.date, code = %code, price, "enter");
                    trade_log.record(TradeEvent {
                        date: bar.date,
                        action: TradeAction::Buy,
                        code: code.clone(),
                        price,
                        shares_after: fill.shares,
                        avg_cost_after: price,
                        realized_profit: None,
                        portfolio_equity: None,
                        reason: TradeReason::SignalEnter,
                    });
                }
            }
            Signal::Exit if state.retained => {
                let equity_before = portfolio.total_equity(&prices);
                if let Some(fill) = portfolio.liquidate(&code, price) {
                    let ret = percent_change(state.entry_price, price);
                    debug!(date = %bar.date, code = %code, price, return_pct = ret, "exit");
                    trade_returns.push(ret);
                    trade_log.record(TradeEvent {
                        date: bar.date,
                        action: TradeAction::Exit,
                        code: code.clone(),
                        price,
                        shares_after: 0.0,
                        avg_cost_after: 0.0,
                        realized_profit: fill.realized_profit,
                        portfolio_equity: Some(equity_before),
                        reason: TradeReason::SignalExit,
                    });
                }
            }
            _ => {}
        }

        let equity = portfolio.total_equity(&prices);
        portfolio.record_equity(bar.date, equity);
    }

    let final_equity = portfolio.total_equity(&prices);
    let open_position = portfolio.position(&code).filter(|p| p.is_held()).map(|p| {
        OpenPosition {
            entry_price: p.avg_cost,
            shares: p.shares,
            last_price: p.last_price.unwrap_or(p.avg_cost),
        }
    });

    info!(
        code = %code,
        rule = rule.name(),
        trades = trade_log.len(),
        final_equity,
        "trend backtest finished"
    );

    TrendResult {
        benchmark_equity: buy_and_hold(data, config.initial_capital),
        first_date: data.ohlcv.first().map(|b| b.date),
        last_date: data.ohlcv.last().map(|b| b.date),
        rule_name: rule.name().to_string(),
        initial_capital: config.initial_capital,
        equity_curve: portfolio.equity_curve,
        code,
        trade_log,
        trade_returns,
        open_position,
        final_equity,
    }
}
