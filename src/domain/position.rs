//! Per-instrument position ledger.
//!
//! A `Position` is created flat, mutated only by the fill operations below,
//! and reset (never removed) when fully exited.

/// Remaining share counts below this are treated as a closed position.
pub const SHARE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub shares: f64,
    pub avg_cost: f64,
    pub highest_price: f64,
    pub trailing_stop: f64,
    pub last_price: Option<f64>,
    trailing_stop_pct: f64,
}

/// What a fill operation actually did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub shares: f64,
    pub notional: f64,
    /// Set for reductions only.
    pub realized_profit: Option<f64>,
}

impl Position {
    pub fn new(trailing_stop_pct: f64) -> Self {
        Position {
            shares: 0.0,
            avg_cost: 0.0,
            highest_price: 0.0,
            trailing_stop: 0.0,
            last_price: None,
            trailing_stop_pct,
        }
    }

    pub fn is_held(&self) -> bool {
        self.shares > 0.0
    }

    pub fn value(&self, price: Option<f64>) -> f64 {
        match price {
            Some(p) => self.shares * p,
            None => 0.0,
        }
    }

    /// Cost basis minus market value, floored at zero.
    pub fn unrealized_loss(&self, price: f64) -> f64 {
        (self.avg_cost * self.shares - self.shares * price).max(0.0)
    }

    pub fn should_trailing_stop(&self, price: f64) -> bool {
        self.is_held() && self.trailing_stop > 0.0 && price <= self.trailing_stop
    }

    pub fn open_or_add(&mut self, price: f64, notional: f64) -> Option<Fill> {
        if notional <= 0.0 || price <= 0.0 {
            return None;
        }
        let bought = notional / price;
        let total = self.shares + bought;
        self.avg_cost = (self.avg_cost * self.shares + notional) / total;
        self.shares = total;
        self.raise_high(price);
        self.check_invariants();
        Some(Fill {
            shares: bought,
            notional,
            realized_profit: None,
        })
    }

    /// Sell `notional` worth of shares, never more than held.
    pub fn reduce(&mut self, price: f64, notional: f64) -> Option<Fill> {
        if !self.is_held() || notional <= 0.0 || price <= 0.0 {
            return None;
        }
        let sold = (notional / price).min(self.shares);
        let fill = Fill {
            shares: sold,
            notional: sold * price,
            realized_profit: Some((price - self.avg_cost) * sold),
        };
        self.shares -= sold;
        if self.shares < SHARE_EPSILON {
            self.reset();
        }
        self.check_invariants();
        Some(fill)
    }

    /// Sell everything at `price`. Always leaves the position flat.
    pub fn liquidate(&mut self, price: f64) -> Option<Fill> {
        if !self.is_held() {
            return None;
        }
        let sold = self.shares;
        let fill = Fill {
            shares: sold,
            notional: sold * price,
            realized_profit: Some((price - self.avg_cost) * sold),
        };
        self.reset();
        self.check_invariants();
        Some(fill)
    }

    pub fn mark_to_market(&mut self, price: f64) {
        if self.is_held() {
            self.raise_high(price);
        }
    }

    fn raise_high(&mut self, price: f64) {
        if price > self.highest_price {
            self.highest_price = price;
            // a zero percentage disables the stop
            if self.trailing_stop_pct > 0.0 {
                self.trailing_stop = self.highest_price * (1.0 - self.trailing_stop_pct);
            }
        }
    }

    fn reset(&mut self) {
        self.shares = 0.0;
        self.avg_cost = 0.0;
        self.highest_price = 0.0;
        self.trailing_stop = 0.0;
    }

    fn check_invariants(&self) {
        assert!(self.shares >= 0.0, "negative share count {}", self.shares);
        assert!(
            self.shares > 0.0
                || (self.avg_cost == 0.0 && self.highest_price == 0.0 && self.trailing_stop == 0.0),
            "flat position carries state: {:?}",
            self
        );
    }
}
