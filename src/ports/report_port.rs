//! Report output port trait.

use crate::domain::backtest::TrendResult;
use crate::domain::engine::PortfolioResult;
use crate::domain::error::TrendfolioError;
use crate::domain::metrics::Metrics;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write_portfolio(&self, result: &PortfolioResult, metrics: &Metrics) -> Result<(), TrendfolioError>;

    fn write_trend(&self, result: &TrendResult, metrics: &Metrics) -> Result<(), TrendfolioError>;
}
