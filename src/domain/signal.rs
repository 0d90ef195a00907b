//! Entry/exit signal rules for single-instrument trend strategies.
//!
//! A rule is a pure function of (history, index, position state). Rules never
//! mutate state; the engine applies `Enter` only from flat and `Exit` only
//! while held.

use crate::domain::code_data::CodeData;
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::PriceBasis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Exit,
    Hold,
}

/// Minimal position state a rule may consult.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionState {
    pub retained: bool,
    pub entry_price: f64,
    pub highest_price: f64,
}

pub trait SignalRule {
    fn name(&self) -> &str;

    /// Indicators that must be precomputed before `decide` is called.
    fn required_indicators(&self) -> Vec<IndicatorType>;

    /// Price the rule reads at `index`, also used by the engine to fill.
    fn price_basis(&self) -> PriceBasis;

    fn decide(&self, data: &CodeData, index: usize, state: &PositionState) -> Signal;
}

fn dropped_from_high(price: f64, highest: f64, max_drawdown: f64) -> bool {
    highest > 0.0 && price < highest * (1.0 - max_drawdown)
}

/// Long-average regime with a drawdown stop.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageRegime {
    pub window: usize,
    pub entry_buffer: f64,
    pub max_drawdown: f64,
    pub basis: PriceBasis,
}

impl Default for MovingAverageRegime {
    fn default() -> Self {
        MovingAverageRegime {
            window: 200,
            entry_buffer: 0.01,
            max_drawdown: 0.15,
            basis: PriceBasis::Close,
        }
    }
}

impl SignalRule for MovingAverageRegime {
    fn name(&self) -> &str {
        "MA regime with trailing stop"
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Sma(self.window)]
    }

    fn price_basis(&self) -> PriceBasis {
        self.basis
    }

    fn decide(&self, data: &CodeData, index: usize, state: &PositionState) -> Signal {
        let Some(sma) = data.indicator(IndicatorType::Sma(self.window), index) else {
            return Signal::Hold;
        };
        let price = self.basis.price(&data.ohlcv[index]);

        if !state.retained {
            if price > sma * (1.0 + self.entry_buffer) {
                return Signal::Enter;
            }
            return Signal::Hold;
        }

        if state.entry_price > 0.0
            && (price < sma || dropped_from_high(price, state.highest_price, self.max_drawdown))
        {
            return Signal::Exit;
        }
        Signal::Hold
    }
}

/// Close at a new lookback high, with a wide drawdown stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakout {
    pub lookback: usize,
    pub max_drawdown: f64,
}

impl Default for Breakout {
    fn default() -> Self {
        Breakout {
            lookback: 20,
            max_drawdown: 0.38,
        }
    }
}

impl SignalRule for Breakout {
    fn name(&self) -> &str {
        "Breakout with trailing stop"
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Highest(self.lookback)]
    }

    fn price_basis(&self) -> PriceBasis {
        PriceBasis::Close
    }

    fn decide(&self, data: &CodeData, index: usize, state: &PositionState) -> Signal {
        let Some(highest) = data.indicator(IndicatorType::Highest(self.lookback), index) else {
            return Signal::Hold;
        };
        let close = data.ohlcv[index].close;

        if !state.retained {
            if close >= highest {
                return Signal::Enter;
            }
            return Signal::Hold;
        }

        if dropped_from_high(close, state.highest_price, self.max_drawdown) {
            return Signal::Exit;
        }
        Signal::Hold
    }
}

/// Configuration names of the available rules.
pub const RULE_NAMES: [&str; 2] = ["ma_regime", "breakout"];

/// Rule selected by name in configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    MovingAverageRegime(MovingAverageRegime),
    Breakout(Breakout),
}

impl RuleKind {
    pub fn as_rule(&self) -> &dyn SignalRule {
        match self {
            RuleKind::MovingAverageRegime(r) => r,
            RuleKind::Breakout(r) => r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    fn data_with(closes: &[f64], types: &[IndicatorType]) -> CodeData {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                code: "QQQ".into(),
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
            })
            .collect();
        let mut cd = CodeData::new("QQQ".into(), bars);
        cd.add_indicators(types);
        cd
    }

    fn ma_rule() -> MovingAverageRegime {
        MovingAverageRegime {
            window: 3,
            ..Default::default()
        }
    }

    fn held(entry: f64, highest: f64) -> PositionState {
        PositionState {
            retained: true,
            entry_price: entry,
            highest_price: highest,
        }
    }

    #[test]
    fn ma_regime_holds_during_warmup() {
        let rule = ma_rule();
        let cd = data_with(&[100.0, 200.0], &rule.required_indicators());
        assert_eq!(rule.decide(&cd, 1, &PositionState::default()), Signal::Hold);
    }

    #[test]
    fn ma_regime_enters_above_buffer() {
        let rule = ma_rule();
        // flat history first: price equal to the average is not an entry
        let cd = data_with(&[100.0, 100.0, 100.0, 104.0, 101.0], &rule.required_indicators());
        assert_eq!(rule.decide(&cd, 2, &PositionState::default()), Signal::Hold);
        assert_eq!(rule.decide(&cd, 3, &PositionState::default()), Signal::Enter);
        // average of (100, 104, 101) is above 101
        assert_eq!(rule.decide(&cd, 4, &PositionState::default()), Signal::Hold);
    }

    #[test]
    fn ma_regime_exits_below_average() {
        let rule = ma_rule();
        let cd = data_with(&[100.0, 100.0, 100.0, 99.0], &rule.required_indicators());
        assert_eq!(rule.decide(&cd, 3, &held(100.0, 100.0)), Signal::Exit);
    }

    #[test]
    fn ma_regime_exits_on_drop_from_high() {
        let rule = ma_rule();
        let cd = data_with(&[80.0, 80.0, 80.0, 84.0], &rule.required_indicators());
        // above the average but 16% under the post-entry high
        assert_eq!(rule.decide(&cd, 3, &held(90.0, 100.0)), Signal::Exit);
        assert_eq!(rule.decide(&cd, 3, &held(90.0, 98.0)), Signal::Hold);
    }

    #[test]
    fn ma_regime_midpoint_basis() {
        let rule = MovingAverageRegime {
            window: 1,
            entry_buffer: 0.0,
            basis: PriceBasis::Midpoint,
            ..Default::default()
        };
        let mut cd = data_with(&[100.0], &rule.required_indicators());
        cd.ohlcv[0].open = 90.0;
        // midpoint 95 is below the close-based average of 100
        assert_eq!(rule.decide(&cd, 0, &PositionState::default()), Signal::Hold);
    }

    #[test]
    fn breakout_enters_at_lookback_high() {
        let rule = Breakout {
            lookback: 3,
            ..Default::default()
        };
        let cd = data_with(&[10.0, 12.0, 11.0, 12.0, 13.0], &rule.required_indicators());
        assert_eq!(rule.decide(&cd, 1, &PositionState::default()), Signal::Hold);
        assert_eq!(rule.decide(&cd, 2, &PositionState::default()), Signal::Hold);
        assert_eq!(rule.decide(&cd, 3, &PositionState::default()), Signal::Enter);
        assert_eq!(rule.decide(&cd, 4, &PositionState::default()), Signal::Enter);
    }

    #[test]
    fn breakout_exits_after_38_pct_drop() {
        let rule = Breakout {
            lookback: 1,
            ..Default::default()
        };
        let cd = data_with(&[61.0, 62.5], &rule.required_indicators());
        assert_eq!(rule.decide(&cd, 0, &held(90.0, 100.0)), Signal::Exit);
        assert_eq!(rule.decide(&cd, 1, &held(90.0, 100.0)), Signal::Hold);
    }

    #[test]
    fn rule_kind_dispatches() {
        let kind = RuleKind::Breakout(Breakout::default());
        assert_eq!(kind.as_rule().name(), "Breakout with trailing stop");
        assert_eq!(
            kind.as_rule().required_indicators(),
            vec![IndicatorType::Highest(20)]
        );
    }
}
