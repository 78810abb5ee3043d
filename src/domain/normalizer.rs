//! Sigmoid normalization of raw indicator values onto a 0-100 scale.
//!
//! score(x) = 100 / (1 + e^(-k * (x - x0)))
//!
//! The exponent is clamped so extreme inputs saturate at 0 or 100 instead of
//! overflowing. NaN inputs map to the neutral 50.

use crate::domain::indicator::{IndicatorKind, IndicatorSet};

/// Largest exponent magnitude passed to `exp`.
pub const MAX_EXPONENT: f64 = 700.0;

pub const NEUTRAL_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidParams {
    /// Steepness, must be positive.
    pub k: f64,
    /// Raw value that maps to 50.
    pub x0: f64,
}

impl SigmoidParams {
    pub fn new(k: f64, x0: f64) -> Self {
        SigmoidParams { k, x0 }
    }

    pub fn normalize(&self, x: f64) -> f64 {
        sigmoid_normalize(x, self.k, self.x0)
    }
}

pub fn sigmoid_normalize(x: f64, k: f64, x0: f64) -> f64 {
    let exponent = -k * (x - x0);
    if exponent.is_nan() {
        return NEUTRAL_SCORE;
    }
    let exponent = exponent.clamp(-MAX_EXPONENT, MAX_EXPONENT);
    (100.0 / (1.0 + exponent.exp())).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    pub momentum: SigmoidParams,
    pub volume_delta: SigmoidParams,
    pub rsi: SigmoidParams,
    pub volatility: SigmoidParams,
}

impl Default for NormalizerConfig {
    /// Midpoints sit on each indicator's neutral reading: no price change,
    /// average volume, RSI 50, and 1% per-bar volatility.
    fn default() -> Self {
        NormalizerConfig {
            momentum: SigmoidParams::new(100.0, 0.0),
            volume_delta: SigmoidParams::new(4.0, 0.0),
            rsi: SigmoidParams::new(0.1, 50.0),
            volatility: SigmoidParams::new(150.0, 0.01),
        }
    }
}

impl NormalizerConfig {
    pub fn get(&self, kind: IndicatorKind) -> SigmoidParams {
        match kind {
            IndicatorKind::Momentum => self.momentum,
            IndicatorKind::VolumeDelta => self.volume_delta,
            IndicatorKind::Rsi => self.rsi,
            IndicatorKind::Volatility => self.volatility,
        }
    }

    pub fn set(&mut self, kind: IndicatorKind, params: SigmoidParams) {
        match kind {
            IndicatorKind::Momentum => self.momentum = params,
            IndicatorKind::VolumeDelta => self.volume_delta = params,
            IndicatorKind::Rsi => self.rsi = params,
            IndicatorKind::Volatility => self.volatility = params,
        }
    }

    pub fn normalize_set(&self, raw: &IndicatorSet) -> NormalizedScores {
        NormalizedScores {
            momentum: self.momentum.normalize(raw.momentum),
            volume_delta: self.volume_delta.normalize(raw.volume_delta),
            rsi: self.rsi.normalize(raw.rsi),
            volatility: self.volatility.normalize(raw.volatility),
        }
    }
}

/// Per-indicator scores in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedScores {
    pub momentum: f64,
    pub volume_delta: f64,
    pub rsi: f64,
    pub volatility: f64,
}

impl NormalizedScores {
    pub fn neutral() -> Self {
        NormalizedScores {
            momentum: NEUTRAL_SCORE,
            volume_delta: NEUTRAL_SCORE,
            rsi: NEUTRAL_SCORE,
            volatility: NEUTRAL_SCORE,
        }
    }

    pub fn get(&self, kind: IndicatorKind) -> f64 {
        match kind {
            IndicatorKind::Momentum => self.momentum,
            IndicatorKind::VolumeDelta => self.volume_delta,
            IndicatorKind::Rsi => self.rsi,
            IndicatorKind::Volatility => self.volatility,
        }
    }

    /// Component-wise mean; neutral when empty.
    pub fn mean<'a, I>(scores: I) -> Self
    where
        I: IntoIterator<Item = &'a NormalizedScores>,
    {
        let mut sum = [0.0_f64; 4];
        let mut count = 0usize;
        for s in scores {
            for kind in IndicatorKind::ALL {
                sum[kind.index()] += s.get(kind);
            }
            count += 1;
        }
        if count == 0 {
            return Self::neutral();
        }
        let n = count as f64;
        NormalizedScores {
            momentum: sum[0] / n,
            volume_delta: sum[1] / n,
            rsi: sum[2] / n,
            volatility: sum[3] / n,
        }
    }
}
