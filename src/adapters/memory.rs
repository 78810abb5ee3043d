//! In-process stores for backtests and dry runs.

use parking_lot::Mutex;

use crate::domain::error::TurbotraderError;
use crate::domain::outcome::TradeOutcome;
use crate::domain::weights::WeightVector;
use crate::ports::outcome_archive_port::OutcomeArchive;
use crate::ports::weight_repository_port::WeightRepository;

#[derive(Debug, Default)]
pub struct InMemoryArchive {
    outcomes: Mutex<Vec<TradeOutcome>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.lock().is_empty()
    }
}

impl OutcomeArchive for InMemoryArchive {
    fn append(&self, outcome: &TradeOutcome) -> Result<(), TurbotraderError> {
        self.outcomes.lock().push(outcome.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<TradeOutcome>, TurbotraderError> {
        Ok(self.outcomes.lock().clone())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWeights {
    saved: Mutex<Option<WeightVector>>,
}

impl InMemoryWeights {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WeightRepository for InMemoryWeights {
    fn load(&self) -> Result<Option<WeightVector>, TurbotraderError> {
        Ok(*self.saved.lock())
    }

    fn save(&self, weights: &WeightVector) -> Result<(), TurbotraderError> {
        weights.validate()?;
        *self.saved.lock() = Some(*weights);
        Ok(())
    }
}
