//! Append-only archive of consumed trade outcomes.

use crate::domain::error::TurbotraderError;
use crate::domain::outcome::TradeOutcome;

pub trait OutcomeArchive {
    fn append(&self, outcome: &TradeOutcome) -> Result<(), TurbotraderError>;

    /// All archived outcomes in append order.
    fn read_all(&self) -> Result<Vec<TradeOutcome>, TurbotraderError>;
}
