//! Rolling highest close.
//!
//! HIGHEST(n)[i] = max(C[i-j] for j in 0..n), window includes the current bar.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_highest(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let warmup = period.saturating_sub(1);

    for (i, bar) in bars.iter().enumerate() {
        let valid = period > 0 && i >= warmup;
        let value = if valid {
            bars[i + 1 - period..=i]
                .iter()
                .map(|b| b.close)
                .fold(f64::NEG_INFINITY, f64::max)
        } else {
            0.0
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Highest(period),
        values,
    }
}
