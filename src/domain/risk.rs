//! Portfolio risk limits.

use crate::domain::position::Position;

/// Allocation and stop constants, all expressed as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    /// Cap on one instrument's value as a share of total equity.
    pub max_alloc_per_ticker: f64,
    /// Size of one buy or sell tranche as a share of total equity.
    pub tranche_fraction: f64,
    /// Distance of the trailing stop below the post-entry high.
    pub trailing_stop_pct: f64,
    /// Unrealized loss, as a share of total equity, that forces an exit.
    pub risk_cutoff_fraction: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            max_alloc_per_ticker: 0.20,
            tranche_fraction: 0.05,
            trailing_stop_pct: 0.15,
            risk_cutoff_fraction: 0.01,
        }
    }
}

impl RiskLimits {
    pub fn tranche_value(&self, total_equity: f64) -> f64 {
        self.tranche_fraction * total_equity
    }

    /// Room left under the per-instrument cap. Negative when already above it.
    pub fn allowable_value(&self, total_equity: f64, position_value: f64) -> f64 {
        self.max_alloc_per_ticker * total_equity - position_value
    }

    /// Loss cutoff is measured against current equity, not equity at entry,
    /// so the effective stop tightens as the portfolio shrinks.
    pub fn breaches_loss_cutoff(&self, position: &Position, price: f64, total_equity: f64) -> bool {
        position.is_held()
            && position.unrealized_loss(price) >= self.risk_cutoff_fraction * total_equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_at_100(shares_value: f64) -> Position {
        let mut pos = Position::new(0.15);
        pos.open_or_add(100.0, shares_value);
        pos
    }

    #[test]
    fn defaults() {
        let r = RiskLimits::default();
        assert_eq!(r.max_alloc_per_ticker, 0.20);
        assert_eq!(r.tranche_fraction, 0.05);
        assert_eq!(r.trailing_stop_pct, 0.15);
        assert_eq!(r.risk_cutoff_fraction, 0.01);
    }

    #[test]
    fn tranche_and_allowable() {
        let r = RiskLimits::default();
        assert!((r.tranche_value(1000.0) - 50.0).abs() < 1e-12);
        assert!((r.allowable_value(1000.0, 150.0) - 50.0).abs() < 1e-12);
        assert!(r.allowable_value(1000.0, 250.0) < 0.0);
    }

    #[test]
    fn loss_cutoff_boundary_is_inclusive() {
        let r = RiskLimits::default();
        let pos = position_at_100(100.0);
        // one share, cost 100, price 90: loss 10 == 1% of 1000
        assert!(r.breaches_loss_cutoff(&pos, 90.0, 1000.0));
        assert!(!r.breaches_loss_cutoff(&pos, 90.01, 1000.0));
    }

    #[test]
    fn loss_cutoff_relative_to_current_equity() {
        let r = RiskLimits::default();
        let pos = position_at_100(100.0);
        // the same 5 loss passes at 1000 equity but breaches once equity is 500
        assert!(!r.breaches_loss_cutoff(&pos, 95.0, 1000.0));
        assert!(r.breaches_loss_cutoff(&pos, 95.0, 500.0));
    }

    #[test]
    fn loss_cutoff_never_fires_on_flat_position() {
        let r = RiskLimits::default();
        assert!(!r.breaches_loss_cutoff(&Position::new(0.15), 1.0, 0.0));
    }
}
