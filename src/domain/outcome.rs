//! Closed trade records and their summary statistics.

use chrono::NaiveDateTime;

use crate::domain::normalizer::NormalizedScores;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub asset: String,
    pub entry_score: f64,
    pub exit_score: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub win: bool,
    pub entry_timestamp: NaiveDateTime,
    /// Close time.
    pub timestamp: NaiveDateTime,
    /// Mean normalized features at entry.
    pub entry_features: NormalizedScores,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSummary {
    pub win_rate: f64,
    pub total_pnl: f64,
    pub trade_count: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[TradeOutcome]) -> Self {
        let trade_count = outcomes.len();
        let wins = outcomes.iter().filter(|o| o.win).count();
        let total_pnl = outcomes.iter().map(|o| o.pnl).sum();
        let win_rate = if trade_count == 0 {
            0.0
        } else {
            wins as f64 / trade_count as f64
        };
        OutcomeSummary {
            win_rate,
            total_pnl,
            trade_count,
        }
    }
}
