//! Multi-asset portfolio engine.
//!
//! Replays a unified calendar over every instrument. Each day the price book
//! is refreshed, then instruments are visited in caller order and may hit the
//! loss cutoff, the trailing stop, a de-risk sell or an accumulate buy. Equity
//! is re-read after every fill so later instruments see earlier trades.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::code_data::{compute_uptrend_flags, CodeData, TrendFilter};
use crate::domain::portfolio::{Holding, Portfolio, PriceBook};
use crate::domain::position::Fill;
use crate::domain::risk::RiskLimits;
use crate::domain::trade_log::{TradeAction, TradeEvent, TradeLog, TradeReason};

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    /// Bars at the start of each series during which the uptrend flag is off.
    pub warmup: usize,
    pub risk: RiskLimits,
    pub trend: TrendFilter,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            initial_capital: 1000.0,
            warmup: 200,
            risk: RiskLimits::default(),
            trend: TrendFilter::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortfolioResult {
    pub portfolio: Portfolio,
    pub trade_log: TradeLog,
    /// Last known price per instrument at the end of the calendar.
    pub prices: PriceBook,
    pub final_equity: f64,
    pub end_date: Option<NaiveDate>,
}

impl PortfolioResult {
    pub fn holdings(&self) -> Vec<Holding> {
        self.portfolio.holdings(&self.prices)
    }
}

/// Compute the trend averages and uptrend flags for every instrument.
pub fn prepare_code_data(codes: &mut [CodeData], config: &PortfolioConfig) {
    for cd in codes.iter_mut() {
        compute_uptrend_flags(cd, &config.trend, config.warmup);
        debug!(
            code = %cd.code,
            bars = cd.bar_count(),
            uptrend_days = cd.uptrend.iter().filter(|f| **f).count(),
            "uptrend flags computed"
        );
    }
}

/// Run the simulation. Open positions are valued, not closed, at the end.
pub fn run_portfolio_backtest(
    codes: &[CodeData],
    timeline: &[NaiveDate],
    config: &PortfolioConfig,
) -> PortfolioResult {
    let code_list: Vec<String> = codes.iter().map(|cd| cd.code.clone()).collect();
    let mut session = Session {
        portfolio: Portfolio::new(
            config.initial_capital,
            &code_list,
            config.risk.trailing_stop_pct,
        ),
        trade_log: TradeLog::new(),
        prices: PriceBook::new(),
        limits: config.risk,
    };

    for &date in timeline {
        let observed: Vec<(&CodeData, usize)> = codes
            .iter()
            .filter_map(|cd| cd.get_bar_index(date).map(|i| (cd, i)))
            .collect();

        for &(cd, index) in &observed {
            session.prices.insert(cd.code.clone(), cd.ohlcv[index].close);
        }

        let mut equity = session.equity();
        for (cd, index) in observed {
            equity = session.step(cd, index, date, equity);
        }

        let end_of_day = session.equity();
        session.portfolio.record_equity(date, end_of_day);
    }

    let final_equity = session.equity();
    info!(
        dates = timeline.len(),
        trades = session.trade_log.len(),
        final_equity,
        "portfolio backtest finished"
    );

    PortfolioResult {
        final_equity,
        end_date: timeline.last().copied(),
        portfolio: session.portfolio,
        trade_log: session.trade_log,
        prices: session.prices,
    }
}

struct Session {
    portfolio: Portfolio,
    trade_log: TradeLog,
    prices: PriceBook,
    limits: RiskLimits,
}

impl Session {
    fn equity(&self) -> f64 {
        self.portfolio.total_equity(&self.prices)
    }

    /// Evaluate one instrument on one date; returns the refreshed equity.
    fn step(&mut self, data: &CodeData, index: usize, date: NaiveDate, equity: f64) -> f64 {
        let code = data.code.as_str();
        let price = data.ohlcv[index].close;
        let limits = self.limits;

        let Some(pos) = self.portfolio.position_mut(code) else {
            return equity;
        };
        let prev = pos.last_price.replace(price);
        pos.mark_to_market(price);
        let loss_cutoff = limits.breaches_loss_cutoff(pos, price, equity);
        let trailing_stop = pos.should_trailing_stop(price);
        let held = pos.is_held();

        if loss_cutoff {
            self.exit(code, date, price, TradeReason::LossCutoff);
            return self.equity();
        }
        if trailing_stop {
            self.exit(code, date, price, TradeReason::TrailingStop);
            return self.equity();
        }

        let increasing = prev.is_none_or(|p| price > p);
        let decreasing = prev.is_some_and(|p| price < p);
        let mut equity = equity;

        if decreasing && held {
            self.sell_tranche(code, date, price, limits.tranche_value(equity));
            equity = self.equity();
        }

        if increasing && data.is_uptrend(index) {
            let value = self.position_value(code, price);
            let buy_value = limits
                .tranche_value(equity)
                .min(limits.allowable_value(equity, value));
            if buy_value > 0.0 && self.buy_tranche(code, date, price, buy_value) {
                equity = self.equity();
            }
        }

        equity
    }

    fn position_value(&self, code: &str, price: f64) -> f64 {
        self.portfolio
            .position(code)
            .map_or(0.0, |p| p.value(Some(price)))
    }

    fn exit(&mut self, code: &str, date: NaiveDate, price: f64, reason: TradeReason) {
        let equity_before = self.equity();
        if let Some(fill) = self.portfolio.liquidate(code, price) {
            debug!(%date, code, price, reason = %reason, "exit");
            self.record(date, TradeAction::Exit, code, price, fill, Some(equity_before), reason);
        }
    }

    fn sell_tranche(&mut self, code: &str, date: NaiveDate, price: f64, tranche: f64) {
        let equity_before = self.equity();
        let sell_value = tranche.min(self.position_value(code, price));
        if sell_value <= 0.0 {
            return;
        }
        if let Some(fill) = self.portfolio.sell(code, price, sell_value) {
            debug!(%date, code, price, notional = fill.notional, "de-risk sell");
            self.record(
                date,
                TradeAction::Sell,
                code,
                price,
                fill,
                Some(equity_before),
                TradeReason::PriceDown,
            );
        }
    }

    fn buy_tranche(&mut self, code: &str, date: NaiveDate, price: f64, notional: f64) -> bool {
        let Some(fill) = self.portfolio.buy(code, price, notional) else {
            return false;
        };
        debug!(%date, code, price, notional = fill.notional, "accumulate buy");
        self.record(
            date,
            TradeAction::Buy,
            code,
            price,
            fill,
            None,
            TradeReason::UptrendPriceUp,
        );
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        date: NaiveDate,
        action: TradeAction,
        code: &str,
        price: f64,
        fill: Fill,
        portfolio_equity: Option<f64>,
        reason: TradeReason,
    ) {
        let (shares_after, avg_cost_after) = self
            .portfolio
            .position(code)
            .map_or((0.0, 0.0), |p| (p.shares, p.avg_cost));
        self.trade_log.record(TradeEvent {
            date,
            action,
            code: code.to_string(),
            price,
            shares_after,
            avg_cost_after,
            realized_profit: fill.realized_profit,
            portfolio_equity,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::code_data::build_unified_timeline;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    /// Instrument with explicit closes and uptrend flags.
    fn series(code: &str, closes: &[f64], uptrend: bool) -> CodeData {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                code: code.into(),
                date: day(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
            })
            .collect();
        let mut cd = CodeData::new(code.into(), bars);
        cd.uptrend = vec![uptrend; closes.len()];
        cd
    }

    fn run(codes: &[CodeData]) -> PortfolioResult {
        let timeline = build_unified_timeline(codes);
        run_portfolio_backtest(codes, &timeline, &PortfolioConfig::default())
    }

    #[test]
    fn first_observation_counts_as_increasing() {
        let result = run(&[series("A", &[100.0], true)]);
        let events = result.trade_log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, TradeAction::Buy);
        assert_eq!(events[0].reason, TradeReason::UptrendPriceUp);
        assert_relative_eq!(events[0].shares_after, 0.5);
        assert_eq!(events[0].portfolio_equity, None);
        assert_relative_eq!(result.portfolio.cash, 950.0);
    }

    #[test]
    fn no_buys_without_uptrend() {
        let result = run(&[series("A", &[100.0, 101.0, 102.0], false)]);
        assert!(result.trade_log.is_empty());
        assert_relative_eq!(result.final_equity, 1000.0);
        assert_eq!(result.portfolio.equity_curve.len(), 3);
    }

    #[test]
    fn trailing_stop_exit_after_drop() {
        let mut a = series("A", &[100.0, 84.9], true);
        a.uptrend[1] = false;
        let result = run(&[a]);
        let events = result.trade_log.events();
        assert_eq!(events.len(), 2);
        // loss 7.55 stays under the 1% cutoff, the stop at 85 fires
        assert_eq!(events[1].action, TradeAction::Exit);
        assert_eq!(events[1].reason, TradeReason::TrailingStop);
        assert_eq!(events[1].shares_after, 0.0);
        assert_relative_eq!(events[1].realized_profit.unwrap(), -7.55, epsilon = 1e-9);
        assert!(!result.portfolio.position("A").unwrap().is_held());
    }

    #[test]
    fn loss_cutoff_takes_precedence_over_trailing_stop() {
        let result = run(&[series("A", &[100.0, 80.0], true)]);
        let events = result.trade_log.events();
        assert_eq!(events[1].reason, TradeReason::LossCutoff);
        // no re-buy on the exit day
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn falling_price_sells_a_tranche() {
        let mut a = series("A", &[100.0, 110.0, 105.0], true);
        a.uptrend[2] = false;
        let result = run(&[a]);
        let events = result.trade_log.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].action, TradeAction::Sell);
        assert_eq!(events[2].reason, TradeReason::PriceDown);
        assert!(events[2].realized_profit.unwrap() > 0.0);
        assert!(events[2].portfolio_equity.is_some());
    }

    #[test]
    fn only_trending_instrument_accumulates_within_cap() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let a = series("A", &closes, true);
        let b = series("B", &[50.0; 30], false);
        let result = run(&[a, b]);

        assert_eq!(result.trade_log.counts("B").total(), 0);
        assert!(result.trade_log.counts("A").buys >= 4);
        for (i, point) in result.portfolio.equity_curve.iter().enumerate() {
            let event_value: f64 = result
                .trade_log
                .events()
                .iter()
                .filter(|e| e.date == point.date)
                .map(|e| e.holding_value())
                .fold(0.0, f64::max);
            assert!(
                event_value <= 0.20 * point.equity + 1e-9,
                "day {i}: {event_value} above cap of {}",
                point.equity
            );
        }
        let holdings = result.holdings();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].code, "A");
    }

    #[test]
    fn missing_dates_carry_price_forward() {
        let a = series("A", &[100.0, 101.0, 102.0], true);
        let mut bars = series("B", &[50.0, 52.0, 54.0], true).ohlcv;
        bars.remove(1);
        let mut b = CodeData::new("B".into(), bars);
        b.uptrend = vec![true; 2];
        let result = run(&[a, b]);

        assert_eq!(result.portfolio.equity_curve.len(), 3);
        assert_eq!(result.trade_log.for_code("B").filter(|e| e.date == day(1)).count(), 0);
        assert_relative_eq!(result.prices["B"], 54.0);

        let expected = result.portfolio.cash
            + result
                .portfolio
                .positions()
                .map(|(code, p)| p.shares * result.prices[code])
                .sum::<f64>();
        assert_relative_eq!(result.final_equity, expected, epsilon = 1e-9);
    }

    #[test]
    fn open_positions_are_not_closed_at_end() {
        let result = run(&[series("A", &[100.0, 101.0], true)]);
        assert!(result.portfolio.position("A").unwrap().is_held());
        assert_eq!(result.end_date, Some(day(1)));
        assert_eq!(result.trade_log.counts("A").exits, 0);
    }

    #[test]
    fn empty_calendar() {
        let result = run_portfolio_backtest(&[], &[], &PortfolioConfig::default());
        assert_eq!(result.end_date, None);
        assert_relative_eq!(result.final_equity, 1000.0);
    }

    #[test]
    fn prepare_sets_flags_from_trend_filter() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let mut codes = vec![series("A", &closes, false)];
        let config = PortfolioConfig {
            warmup: 4,
            trend: TrendFilter { fast: 2, mid: 3, slow: 4 },
            ..Default::default()
        };
        prepare_code_data(&mut codes, &config);
        assert!(!codes[0].is_uptrend(3));
        assert!(codes[0].is_uptrend(4));
    }
}
