//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::position::{Fill, Position};

/// Last known price per instrument code.
pub type PriceBook = HashMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub code: String,
    pub value: f64,
    pub allocation_pct: f64,
}

/// Cash plus one position per instrument, iterated in caller order.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    codes: Vec<String>,
    positions: HashMap<String, Position>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64, codes: &[String], trailing_stop_pct: f64) -> Self {
        let positions = codes
            .iter()
            .map(|c| (c.clone(), Position::new(trailing_stop_pct)))
            .collect();
        Portfolio {
            cash: initial_capital,
            initial_capital,
            codes: codes.to_vec(),
            positions,
            equity_curve: Vec::new(),
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn position(&self, code: &str) -> Option<&Position> {
        self.positions.get(code)
    }

    pub fn position_mut(&mut self, code: &str) -> Option<&mut Position> {
        self.positions.get_mut(code)
    }

    /// Positions in instrument order.
    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.codes
            .iter()
            .filter_map(|c| self.positions.get(c).map(|p| (c.as_str(), p)))
    }

    /// Spend up to `notional` of cash on `code`.
    pub fn buy(&mut self, code: &str, price: f64, notional: f64) -> Option<Fill> {
        let notional = notional.min(self.cash);
        let fill = self.positions.get_mut(code)?.open_or_add(price, notional)?;
        self.cash -= fill.notional;
        Some(fill)
    }

    pub fn sell(&mut self, code: &str, price: f64, notional: f64) -> Option<Fill> {
        let fill = self.positions.get_mut(code)?.reduce(price, notional)?;
        self.cash += fill.notional;
        Some(fill)
    }

    pub fn liquidate(&mut self, code: &str, price: f64) -> Option<Fill> {
        let fill = self.positions.get_mut(code)?.liquidate(price)?;
        self.cash += fill.notional;
        Some(fill)
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Cash plus the value of every position with a known price.
    pub fn total_equity(&self, prices: &PriceBook) -> f64 {
        let position_value: f64 = self
            .positions()
            .map(|(code, pos)| pos.value(prices.get(code).copied()))
            .sum();
        self.cash + position_value
    }

    /// Instruments with a positive value, with their share of equity in percent.
    pub fn holdings(&self, prices: &PriceBook) -> Vec<Holding> {
        let equity = self.total_equity(prices);
        self.positions()
            .filter_map(|(code, pos)| {
                let value = pos.value(prices.get(code).copied());
                (value > 0.0).then(|| Holding {
                    code: code.to_string(),
                    value,
                    allocation_pct: if equity > 0.0 {
                        value / equity * 100.0
                    } else {
                        0.0
                    },
                })
            })
            .collect()
    }
}
