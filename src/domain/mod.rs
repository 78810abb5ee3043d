//! Core domain types and logic: indicators through decisions, backtesting
//! and weight adaptation.

pub mod ohlcv;
pub mod timeframe;
pub mod resample;
pub mod indicator;
pub mod normalizer;
pub mod weights;
pub mod aggregator;
pub mod scorer;
pub mod decision;
pub mod outcome;
pub mod position;
pub mod portfolio;
pub mod strategy;
pub mod trader;
pub mod backtest;
pub mod learning;
pub mod scanner;
pub mod config_validation;
pub mod error;
