//! Strategy configuration: everything a trading cycle needs besides data.

use crate::domain::decision::{PositionSizer, Thresholds};
use crate::domain::scorer::ScoringConfig;
use crate::domain::timeframe::Timeframe;
use crate::domain::weights::WeightVector;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Scored timeframes, shortest first.
    pub timeframes: Vec<Timeframe>,
    pub scoring: ScoringConfig,
    pub thresholds: Thresholds,
    pub sizer: PositionSizer,
    /// Initial weights when nothing has been persisted.
    pub weights: WeightVector,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            timeframes: Timeframe::ALL.to_vec(),
            scoring: ScoringConfig::default(),
            thresholds: Thresholds::default(),
            sizer: PositionSizer::default(),
            weights: WeightVector::default(),
        }
    }
}

impl StrategyConfig {
    /// Bars per timeframe needed by the longest-lookback indicator.
    pub fn required_bars(&self) -> usize {
        self.scoring.indicators.required_bars()
    }

    /// Shortest configured timeframe; its last bar prices the cycle.
    pub fn finest_timeframe(&self) -> Option<Timeframe> {
        self.timeframes.iter().min().copied()
    }
}
