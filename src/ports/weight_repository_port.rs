//! Persistence for the current weight vector.

use crate::domain::error::TurbotraderError;
use crate::domain::weights::WeightVector;

pub trait WeightRepository {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<WeightVector>, TurbotraderError>;

    fn save(&self, weights: &WeightVector) -> Result<(), TurbotraderError>;
}
