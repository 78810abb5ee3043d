//! Open long position.

use chrono::NaiveDateTime;

use crate::domain::normalizer::NormalizedScores;
use crate::domain::outcome::TradeOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub asset: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_score: f64,
    pub entry_features: NormalizedScores,
    pub entry_timestamp: NaiveDateTime,
    pub order_id: String,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// Closes the whole position at `exit_price`.
    pub fn close(self, exit_price: f64, exit_score: f64, timestamp: NaiveDateTime) -> TradeOutcome {
        let pnl = self.unrealized_pnl(exit_price);
        TradeOutcome {
            asset: self.asset,
            entry_score: self.entry_score,
            exit_score,
            entry_price: self.entry_price,
            exit_price,
            quantity: self.quantity,
            pnl,
            win: pnl > 0.0,
            entry_timestamp: self.entry_timestamp,
            timestamp,
            entry_features: self.entry_features,
        }
    }
}
