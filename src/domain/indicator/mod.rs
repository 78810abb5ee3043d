//! Technical indicators computed for the latest bar of a series.
//!
//! - `IndicatorKind`: identity of the four scored features
//! - `IndicatorSet`: raw values for one (asset, timeframe, timestamp)
//! - `IndicatorConfig`: lookback windows
//!
//! Every calculator fails with `InsufficientData` when the series is shorter
//! than its lookback requires.

pub mod momentum;
pub mod rsi;
pub mod volatility;
pub mod volume_delta;

use std::fmt;

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKind {
    Momentum,
    VolumeDelta,
    Rsi,
    Volatility,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 4] = [
        IndicatorKind::Momentum,
        IndicatorKind::VolumeDelta,
        IndicatorKind::Rsi,
        IndicatorKind::Volatility,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Momentum => "momentum",
            IndicatorKind::VolumeDelta => "volume_delta",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Volatility => "volatility",
        }
    }

    /// Weight category this indicator feeds.
    pub fn category(&self) -> &'static str {
        match self {
            IndicatorKind::Momentum => "price",
            IndicatorKind::VolumeDelta => "volume",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Volatility => "volatility",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            IndicatorKind::Momentum => 0,
            IndicatorKind::VolumeDelta => 1,
            IndicatorKind::Rsi => 2,
            IndicatorKind::Volatility => 3,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw indicator values for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSet {
    pub momentum: f64,
    pub volume_delta: f64,
    pub rsi: f64,
    pub volatility: f64,
}

impl IndicatorSet {
    pub fn get(&self, kind: IndicatorKind) -> f64 {
        match kind {
            IndicatorKind::Momentum => self.momentum,
            IndicatorKind::VolumeDelta => self.volume_delta,
            IndicatorKind::Rsi => self.rsi,
            IndicatorKind::Volatility => self.volatility,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    /// Shared by momentum and volume delta.
    pub momentum_lookback: usize,
    pub rsi_period: usize,
    pub volatility_period: usize,
    /// Volatility is scaled by `sqrt(volatility_annualization)`.
    pub volatility_annualization: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            momentum_lookback: 10,
            rsi_period: 14,
            volatility_period: 20,
            volatility_annualization: 1.0,
        }
    }
}

impl IndicatorConfig {
    /// Bars needed for the longest-lookback indicator.
    pub fn required_bars(&self) -> usize {
        [
            self.momentum_lookback,
            self.rsi_period,
            self.volatility_period,
        ]
        .iter()
        .map(|&n| n.max(1) + 1)
        .max()
        .unwrap_or(2)
    }
}

pub fn compute_indicator_set(
    bars: &[OhlcvBar],
    config: &IndicatorConfig,
) -> Result<IndicatorSet, TurbotraderError> {
    Ok(IndicatorSet {
        momentum: momentum::calculate_momentum(bars, config.momentum_lookback)?,
        volume_delta: volume_delta::calculate_volume_delta(bars, config.momentum_lookback)?,
        rsi: rsi::calculate_rsi(bars, config.rsi_period)?,
        volatility: volatility::calculate_volatility(
            bars,
            config.volatility_period,
            config.volatility_annualization,
        )?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        let volumes: Vec<f64> = closes.iter().map(|_| 1000.0).collect();
        make_bars_with_volume(closes, &volumes)
    }

    pub fn make_bars_with_volume(closes: &[f64], volumes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| OhlcvBar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect()
    }
}
