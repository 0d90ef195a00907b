//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod position;
pub mod portfolio;
pub mod risk;
pub mod trade_log;
pub mod code_data;
pub mod signal;
pub mod engine;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
