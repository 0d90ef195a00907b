//! Performance metrics over an equity curve and realized trades.

use super::portfolio::EquityPoint;
use super::trade_log::TradeLog;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
}

impl Metrics {
    /// `realized` holds the profit of every reducing fill.
    pub fn compute(initial_capital: f64, equity_curve: &[EquityPoint], realized: &[f64]) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let trades_won = realized.iter().filter(|&&p| p > 0.0).count();
        let trades_lost = realized.iter().filter(|&&p| p < 0.0).count();
        let total_wins: f64 = realized.iter().filter(|&&p| p > 0.0).sum();
        let total_losses: f64 = realized.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

        let win_rate = if realized.is_empty() {
            0.0
        } else {
            trades_won as f64 / realized.len() as f64
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
        }
    }

    pub fn from_trade_log(initial_capital: f64, equity_curve: &[EquityPoint], log: &TradeLog) -> Self {
        let realized: Vec<f64> = log
            .events()
            .iter()
            .filter_map(|e| e.realized_profit)
            .collect();
        Self::compute(initial_capital, equity_curve, &realized)
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}
