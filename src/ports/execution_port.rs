//! Execution boundary: market orders against an exchange or a simulator.

use crate::domain::decision::Action;
use crate::domain::error::TurbotraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub asset: String,
    pub action: Action,
    /// Quote amount for a buy; for a sell, the proceeds expected at `reference_price`.
    pub size: f64,
    /// Base quantity.
    pub quantity: f64,
    /// Latest observed price the order was sized against.
    pub reference_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub filled_price: f64,
    pub quantity: f64,
    pub order_id: String,
}

pub trait ExecutionPort {
    /// Fails with `ExecutionError`; nothing is opened or closed on failure.
    fn submit(&self, order: &OrderRequest) -> Result<Fill, TurbotraderError>;

    /// Free quote balance.
    fn balance(&self) -> Result<f64, TurbotraderError>;

    /// Latest price seen by the scanner for `asset`.
    fn observe_price(&self, _asset: &str, _price: f64) {}
}
