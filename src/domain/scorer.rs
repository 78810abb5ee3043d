//! Multi-timeframe scoring: indicators, normalization and aggregation per
//! timeframe, then an equal-weighted composite across timeframes.

use std::collections::BTreeMap;

use crate::domain::aggregator::timeframe_score;
use crate::domain::error::TurbotraderError;
use crate::domain::indicator::{IndicatorConfig, IndicatorSet, compute_indicator_set};
use crate::domain::normalizer::{NormalizedScores, NormalizerConfig};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::domain::weights::WeightVector;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub indicators: IndicatorConfig,
    pub normalizer: NormalizerConfig,
    /// Fewest scored timeframes that still yield a composite.
    pub min_timeframes: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            indicators: IndicatorConfig::default(),
            normalizer: NormalizerConfig::default(),
            min_timeframes: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeScore {
    pub timeframe: Timeframe,
    pub indicators: IndicatorSet,
    pub normalized: NormalizedScores,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetScore {
    pub asset: String,
    pub composite: f64,
    /// Scored timeframes, shortest first.
    pub timeframes: Vec<TimeframeScore>,
    /// Timeframes excluded for lack of history.
    pub skipped: Vec<Timeframe>,
}

impl AssetScore {
    /// Mean normalized features across scored timeframes.
    pub fn mean_features(&self) -> NormalizedScores {
        NormalizedScores::mean(self.timeframes.iter().map(|t| &t.normalized))
    }

    pub fn mean_raw_rsi(&self) -> f64 {
        if self.timeframes.is_empty() {
            return 50.0;
        }
        self.timeframes.iter().map(|t| t.indicators.rsi).sum::<f64>()
            / self.timeframes.len() as f64
    }
}

pub fn score_timeframe(
    timeframe: Timeframe,
    bars: &[OhlcvBar],
    config: &ScoringConfig,
    weights: &WeightVector,
) -> Result<TimeframeScore, TurbotraderError> {
    let indicators = compute_indicator_set(bars, &config.indicators)?;
    let normalized = config.normalizer.normalize_set(&indicators);
    Ok(TimeframeScore {
        timeframe,
        indicators,
        normalized,
        score: timeframe_score(&normalized, weights),
    })
}

/// Equal-weighted mean of the timeframe scores.
pub fn composite_score(
    asset: &str,
    scores: &[TimeframeScore],
    min_timeframes: usize,
) -> Result<f64, TurbotraderError> {
    if scores.is_empty() || scores.len() < min_timeframes {
        return Err(TurbotraderError::InsufficientTimeframes {
            asset: asset.to_string(),
            usable: scores.len(),
            minimum: min_timeframes,
        });
    }
    let mean = scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64;
    Ok(mean.clamp(0.0, 100.0))
}

/// Scores every supplied timeframe. Timeframes short of history are excluded
/// from the composite rather than counted as zero.
pub fn score_asset(
    asset: &str,
    series: &BTreeMap<Timeframe, Vec<OhlcvBar>>,
    config: &ScoringConfig,
    weights: &WeightVector,
) -> Result<AssetScore, TurbotraderError> {
    let mut timeframes = Vec::with_capacity(series.len());
    let mut skipped = Vec::new();

    for (&timeframe, bars) in series {
        match score_timeframe(timeframe, bars, config, weights) {
            Ok(score) => timeframes.push(score),
            Err(e @ TurbotraderError::InsufficientData { .. }) => {
                tracing::debug!(asset, %timeframe, error = %e, "timeframe excluded");
                skipped.push(timeframe);
            }
            Err(e) => return Err(e),
        }
    }

    let composite = composite_score(asset, &timeframes, config.min_timeframes)?;
    Ok(AssetScore {
        asset: asset.to_string(),
        composite,
        timeframes,
        skipped,
    })
}
