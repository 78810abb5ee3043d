//! The capabilities a trading cycle needs beyond scoring.
//!
//! Live trading binds these to the confirmation service, the exchange and
//! the outcome archive; backtests bind them to a deterministic policy, fills
//! at the replay bar and an in-memory outcome list.

use crate::domain::decision::{ConfirmationRequest, Verdict};
use crate::domain::error::TurbotraderError;
use crate::domain::outcome::TradeOutcome;
use crate::ports::execution_port::{Fill, OrderRequest};

pub trait DecisionSink {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError>;

    fn execute(&mut self, order: &OrderRequest) -> Result<Fill, TurbotraderError>;

    fn record_outcome(&mut self, outcome: TradeOutcome) -> Result<(), TurbotraderError>;
}
