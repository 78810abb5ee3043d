//! Quote balance and open positions.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::domain::error::TurbotraderError;
use crate::domain::outcome::TradeOutcome;
use crate::domain::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Keyed by asset; ordered so closing all positions is deterministic.
    pub positions: BTreeMap<String, Position>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
        }
    }

    /// Debits the position cost and records it.
    pub fn open(&mut self, position: Position) -> Result<(), TurbotraderError> {
        if self.positions.contains_key(&position.asset) {
            return Err(TurbotraderError::ExecutionError {
                asset: position.asset.clone(),
                reason: "position already open".into(),
            });
        }
        self.cash -= position.cost_basis();
        self.positions.insert(position.asset.clone(), position);
        Ok(())
    }

    /// Credits the proceeds and returns the closed trade, if a position existed.
    pub fn close(
        &mut self,
        asset: &str,
        exit_price: f64,
        exit_score: f64,
        timestamp: NaiveDateTime,
    ) -> Option<TradeOutcome> {
        let position = self.positions.remove(asset)?;
        self.cash += position.market_value(exit_price);
        Some(position.close(exit_price, exit_score, timestamp))
    }

    pub fn get_position(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset)
    }

    pub fn has_position(&self, asset: &str) -> bool {
        self.positions.contains_key(asset)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                price_map
                    .get(&pos.asset)
                    .map(|&price| pos.market_value(price))
                    .unwrap_or_else(|| pos.cost_basis())
            })
            .sum();
        self.cash + position_value
    }
}
