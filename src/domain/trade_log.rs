//! Append-only trade event log.
//!
//! The capped "recent trades" view and the full history are both slices of
//! the same event sequence.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy,
    Sell,
    Exit,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Exit => "EXIT",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeReason {
    LossCutoff,
    TrailingStop,
    PriceDown,
    UptrendPriceUp,
    SignalEnter,
    SignalExit,
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeReason::LossCutoff => "loss cutoff",
            TradeReason::TrailingStop => "trailing stop",
            TradeReason::PriceDown => "price down",
            TradeReason::UptrendPriceUp => "uptrend & price up",
            TradeReason::SignalEnter => "signal enter",
            TradeReason::SignalExit => "signal exit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub code: String,
    pub price: f64,
    pub shares_after: f64,
    pub avg_cost_after: f64,
    pub realized_profit: Option<f64>,
    pub portfolio_equity: Option<f64>,
    pub reason: TradeReason,
}

impl TradeEvent {
    pub fn holding_value(&self) -> f64 {
        self.price * self.shares_after
    }

    /// Realized profit as a percentage of portfolio equity at trade time.
    pub fn profit_pct(&self) -> Option<f64> {
        let profit = self.realized_profit?;
        Some(match self.portfolio_equity {
            Some(equity) if equity != 0.0 => profit / equity * 100.0,
            _ => 0.0,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeCounts {
    pub buys: usize,
    pub sells: usize,
    pub exits: usize,
}

impl TradeCounts {
    pub fn total(&self) -> usize {
        self.buys + self.sells + self.exits
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradeLog {
    events: Vec<TradeEvent>,
    counts: HashMap<String, TradeCounts>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: TradeEvent) {
        let counts = self.counts.entry(event.code.clone()).or_default();
        match event.action {
            TradeAction::Buy => counts.buys += 1,
            TradeAction::Sell => counts.sells += 1,
            TradeAction::Exit => counts.exits += 1,
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The last `limit` events and the number of older events left out.
    pub fn recent(&self, limit: usize) -> (&[TradeEvent], usize) {
        let skipped = self.events.len().saturating_sub(limit);
        (&self.events[skipped..], skipped)
    }

    pub fn for_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a TradeEvent> + 'a {
        self.events.iter().filter(move |e| e.code == code)
    }

    pub fn counts(&self, code: &str) -> TradeCounts {
        self.counts.get(code).copied().unwrap_or_default()
    }
}
