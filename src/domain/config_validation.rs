//! Configuration validation.
//!
//! Runs before any pipeline work; every check reads the same defaults the
//! builders in `cli` fall back to. A numeric key that is present but does not
//! parse is rejected here rather than replaced by its default.

use crate::domain::error::TurbotraderError;
use crate::domain::indicator::IndicatorKind;
use crate::domain::timeframe::{Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TIMEFRAMES: &str = "1m,5m,15m,30m,1h,2h,4h,6h,8h,12h,1d,1w";

/// Capped at the number of configured timeframes.
pub const DEFAULT_MIN_TIMEFRAMES: i64 = 6;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    let timeframes = validate_timeframes(config)?;
    let default_min = DEFAULT_MIN_TIMEFRAMES.min(timeframes.len() as i64);
    validate_min_timeframes(config, "engine", default_min, timeframes.len())?;
    validate_lookbacks(config)?;
    validate_normalizer(config)?;
    validate_weights(config)?;
    validate_thresholds(config)?;
    validate_positions(config)?;
    validate_confirmation(config)?;
    validate_learning_config(config)?;
    validate_runtime(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    let days = int_value(config, "backtest", "days", 30)?;
    if days < 1 {
        return Err(TurbotraderError::config_invalid(
            "backtest",
            "days",
            "days must be at least 1",
        ));
    }
    let interval = config
        .get_string("backtest", "interval")
        .unwrap_or_else(|| "1h".to_string());
    let interval = Timeframe::parse(&interval).ok_or_else(|| {
        TurbotraderError::config_invalid("backtest", "interval", format!("unknown timeframe '{interval}'"))
    })?;
    if int_value(config, "backtest", "step", 1)? < 1 {
        return Err(TurbotraderError::config_invalid(
            "backtest",
            "step",
            "step must be at least 1",
        ));
    }
    if double_value(config, "backtest", "initial_capital", 10_000.0)? <= 0.0 {
        return Err(TurbotraderError::config_invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    let timeframes = validate_timeframes(config)?;
    let usable = timeframes
        .iter()
        .filter(|tf| tf.multiple_of(interval).is_some())
        .count();
    if usable == 0 {
        return Err(TurbotraderError::config_invalid(
            "backtest",
            "interval",
            format!("no configured timeframe can be built from {interval} bars"),
        ));
    }
    validate_min_timeframes(config, "backtest", 1, usable)?;
    Ok(())
}

pub fn validate_learning_config(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    if int_value(config, "learning", "min_trades", 10)? < 0 {
        return Err(TurbotraderError::config_invalid(
            "learning",
            "min_trades",
            "min_trades must be non-negative",
        ));
    }
    let target = double_value(config, "learning", "target_win_rate", 0.55)?;
    if !(0.0..=1.0).contains(&target) {
        return Err(TurbotraderError::config_invalid(
            "learning",
            "target_win_rate",
            "target_win_rate must be between 0 and 1",
        ));
    }
    for key in ["learning_rate", "reinforce_rate"] {
        let default = if key == "learning_rate" { 0.5 } else { 0.1 };
        let value = double_value(config, "learning", key, default)?;
        if !value.is_finite() || value < 0.0 {
            return Err(TurbotraderError::config_invalid(
                "learning",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    let min_weight = double_value(config, "learning", "min_weight", 0.02)?;
    if !(0.0..0.25).contains(&min_weight) {
        return Err(TurbotraderError::config_invalid(
            "learning",
            "min_weight",
            "min_weight must be in [0, 0.25)",
        ));
    }
    Ok(())
}

fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, TurbotraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            TurbotraderError::config_invalid(section, key, format!("'{raw}' is not an integer"))
        }),
    }
}

fn double_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TurbotraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            TurbotraderError::config_invalid(section, key, format!("'{raw}' is not a number"))
        }),
    }
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, TurbotraderError> {
    let raw = config
        .get_string("engine", "timeframes")
        .unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string());
    parse_timeframes(&raw)
        .map_err(|reason| TurbotraderError::config_invalid("engine", "timeframes", reason))
}

fn validate_min_timeframes(
    config: &dyn ConfigPort,
    section: &str,
    default: i64,
    available: usize,
) -> Result<(), TurbotraderError> {
    let value = int_value(config, section, "min_timeframes", default)?;
    if value < 1 || value as usize > available {
        return Err(TurbotraderError::config_invalid(
            section,
            "min_timeframes",
            format!("min_timeframes must be between 1 and {available}"),
        ));
    }
    Ok(())
}

fn validate_lookbacks(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    for (key, default) in [
        ("momentum_lookback", 10),
        ("rsi_period", 14),
        ("volatility_period", 20),
    ] {
        if int_value(config, "indicators", key, default)? < 1 {
            return Err(TurbotraderError::config_invalid(
                "indicators",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }
    if double_value(config, "indicators", "volatility_annualization", 1.0)? <= 0.0 {
        return Err(TurbotraderError::config_invalid(
            "indicators",
            "volatility_annualization",
            "volatility_annualization must be positive",
        ));
    }
    Ok(())
}

fn validate_normalizer(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    for kind in IndicatorKind::ALL {
        let key = format!("{}_k", kind.name());
        let k = double_value(config, "normalizer", &key, 1.0)?;
        if !k.is_finite() || k <= 0.0 {
            return Err(TurbotraderError::config_invalid(
                "normalizer",
                &key,
                "sigmoid steepness must be positive",
            ));
        }
        let x0_key = format!("{}_x0", kind.name());
        if !double_value(config, "normalizer", &x0_key, 0.0)?.is_finite() {
            return Err(TurbotraderError::config_invalid(
                "normalizer",
                &x0_key,
                "sigmoid midpoint must be finite",
            ));
        }
    }
    Ok(())
}

fn validate_weights(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    let mut sum = 0.0;
    for (key, default) in [
        ("price", 70.0),
        ("volume", 10.0),
        ("rsi", 10.0),
        ("volatility", 10.0),
    ] {
        let value = double_value(config, "weights", key, default)?;
        if !value.is_finite() || value < 0.0 {
            return Err(TurbotraderError::config_invalid(
                "weights",
                key,
                "weights must be non-negative",
            ));
        }
        sum += value;
    }
    if sum <= 0.0 {
        return Err(TurbotraderError::config_invalid(
            "weights",
            "price",
            "weights must not all be zero",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    let buy = double_value(config, "decision", "buy_threshold", 70.0)?;
    let sell = double_value(config, "decision", "sell_threshold", 30.0)?;
    if !(0.0..=100.0).contains(&sell) || !(0.0..=100.0).contains(&buy) || sell >= buy {
        return Err(TurbotraderError::config_invalid(
            "decision",
            "buy_threshold",
            "thresholds must satisfy 0 <= sell_threshold < buy_threshold <= 100",
        ));
    }
    Ok(())
}

fn validate_positions(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    let fraction = double_value(config, "positions", "account_fraction", 0.10)?;
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(TurbotraderError::config_invalid(
            "positions",
            "account_fraction",
            "account_fraction must be in (0, 1]",
        ));
    }
    if int_value(config, "positions", "max_concurrent", 5)? < 1 {
        return Err(TurbotraderError::config_invalid(
            "positions",
            "max_concurrent",
            "max_concurrent must be at least 1",
        ));
    }
    if double_value(config, "positions", "min_balance", 10.0)? < 0.0 {
        return Err(TurbotraderError::config_invalid(
            "positions",
            "min_balance",
            "min_balance must be non-negative",
        ));
    }
    Ok(())
}

fn validate_confirmation(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    if int_value(config, "confirmation", "timeout_ms", 5000)? < 1 {
        return Err(TurbotraderError::config_invalid(
            "confirmation",
            "timeout_ms",
            "timeout_ms must be positive",
        ));
    }
    match config.get_string("confirmation", "policy").as_deref() {
        None | Some("always") | Some("rule") => {}
        Some(other) => {
            return Err(TurbotraderError::config_invalid(
                "confirmation",
                "policy",
                format!("unknown policy '{other}', expected 'always' or 'rule'"),
            ));
        }
    }
    let ceiling = double_value(config, "confirmation", "rsi_ceiling", 80.0)?;
    let floor = double_value(config, "confirmation", "rsi_floor", 20.0)?;
    if !(0.0..=100.0).contains(&floor) || !(0.0..=100.0).contains(&ceiling) || floor >= ceiling {
        return Err(TurbotraderError::config_invalid(
            "confirmation",
            "rsi_ceiling",
            "rsi bounds must satisfy 0 <= rsi_floor < rsi_ceiling <= 100",
        ));
    }
    Ok(())
}

/// Keys read only by the scanner loop and the storage adapters.
fn validate_runtime(config: &dyn ConfigPort) -> Result<(), TurbotraderError> {
    if int_value(config, "data", "fetch_limit", 100)? < 1 {
        return Err(TurbotraderError::config_invalid(
            "data",
            "fetch_limit",
            "fetch_limit must be at least 1",
        ));
    }
    if int_value(config, "scanner", "interval_secs", 300)? < 0 {
        return Err(TurbotraderError::config_invalid(
            "scanner",
            "interval_secs",
            "interval_secs must be non-negative",
        ));
    }
    let balance = double_value(config, "paper", "starting_balance", 1000.0)?;
    if !balance.is_finite() || balance <= 0.0 {
        return Err(TurbotraderError::config_invalid(
            "paper",
            "starting_balance",
            "starting_balance must be positive",
        ));
    }
    if int_value(config, "sqlite", "pool_size", 4)? < 1 {
        return Err(TurbotraderError::config_invalid(
            "sqlite",
            "pool_size",
            "pool_size must be at least 1",
        ));
    }
    Ok(())
}
