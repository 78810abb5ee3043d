//! Simulated exchange that fills market orders at the last marked price.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::decision::Action;
use crate::domain::error::TurbotraderError;
use crate::ports::execution_port::{ExecutionPort, Fill, OrderRequest};

#[derive(Debug)]
struct PaperState {
    balance: f64,
    marks: HashMap<String, f64>,
    next_id: u64,
}

#[derive(Debug)]
pub struct PaperExecution {
    state: Mutex<PaperState>,
}

impl PaperExecution {
    pub fn new(starting_balance: f64) -> Self {
        PaperExecution {
            state: Mutex::new(PaperState {
                balance: starting_balance,
                marks: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn mark(&self, asset: &str) -> Option<f64> {
        self.state.lock().marks.get(asset).copied()
    }
}

impl ExecutionPort for PaperExecution {
    fn submit(&self, order: &OrderRequest) -> Result<Fill, TurbotraderError> {
        let rejected = |reason: String| TurbotraderError::ExecutionError {
            asset: order.asset.clone(),
            reason,
        };
        let mut state = self.state.lock();
        let price = state
            .marks
            .get(&order.asset)
            .copied()
            .ok_or_else(|| rejected("no price marked".into()))?;
        if !(order.size > 0.0) {
            return Err(rejected(format!("non-positive order size {}", order.size)));
        }

        let quantity = match order.action {
            Action::Buy => {
                if order.size > state.balance {
                    return Err(rejected(format!(
                        "insufficient balance: need {:.2}, have {:.2}",
                        order.size, state.balance
                    )));
                }
                state.balance -= order.size;
                order.size / price
            }
            Action::Sell => {
                if !(order.quantity > 0.0) {
                    return Err(rejected(format!("non-positive quantity {}", order.quantity)));
                }
                state.balance += order.quantity * price;
                order.quantity
            }
            Action::Hold => return Err(rejected("hold is not an order".into())),
        };

        let order_id = format!("paper-{}", state.next_id);
        state.next_id += 1;
        tracing::debug!(asset = %order.asset, action = %order.action, price, quantity, %order_id, "paper fill");
        Ok(Fill {
            filled_price: price,
            quantity,
            order_id,
        })
    }

    fn balance(&self) -> Result<f64, TurbotraderError> {
        Ok(self.state.lock().balance)
    }

    fn observe_price(&self, asset: &str, price: f64) {
        self.state.lock().marks.insert(asset.to_string(), price);
    }
}
