//! Weight vector over the four indicator categories, and the process-wide
//! store that hands out stable snapshots of it.
//!
//! A `WeightVector` is an immutable value. Learning produces a new vector;
//! the `WeightStore` swaps the whole `Arc` under a write lock, so readers
//! never observe a partially updated vector.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::error::TurbotraderError;
use crate::domain::indicator::IndicatorKind;

/// Allowed deviation of the weight sum from 1.0.
pub const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightVector {
    pub price: f64,
    pub volume: f64,
    pub rsi: f64,
    pub volatility: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        WeightVector {
            price: 0.7,
            volume: 0.1,
            rsi: 0.1,
            volatility: 0.1,
        }
    }
}

impl WeightVector {
    /// Builds a vector from raw nonnegative coefficients, scaling them to sum to 1.
    pub fn from_raw(
        price: f64,
        volume: f64,
        rsi: f64,
        volatility: f64,
    ) -> Result<Self, TurbotraderError> {
        let raw = WeightVector {
            price,
            volume,
            rsi,
            volatility,
        };
        for (kind, w) in IndicatorKind::ALL.iter().zip(raw.as_array()) {
            if !w.is_finite() || w < 0.0 {
                return Err(TurbotraderError::WeightInvariantViolation {
                    reason: format!("{} weight {} is not a nonnegative number", kind.category(), w),
                });
            }
        }
        let normalized = raw.renormalized();
        normalized.validate()?;
        Ok(normalized)
    }

    pub fn get(&self, kind: IndicatorKind) -> f64 {
        match kind {
            IndicatorKind::Momentum => self.price,
            IndicatorKind::VolumeDelta => self.volume,
            IndicatorKind::Rsi => self.rsi,
            IndicatorKind::Volatility => self.volatility,
        }
    }

    pub fn sum(&self) -> f64 {
        self.price + self.volume + self.rsi + self.volatility
    }

    /// Weights in `IndicatorKind::index()` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.price, self.volume, self.rsi, self.volatility]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        WeightVector {
            price: values[0],
            volume: values[1],
            rsi: values[2],
            volatility: values[3],
        }
    }

    /// Divides every weight by the sum. A non-positive sum is returned unchanged.
    pub fn renormalized(&self) -> Self {
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return *self;
        }
        WeightVector::from_array(self.as_array().map(|w| w / sum))
    }

    pub fn validate(&self) -> Result<(), TurbotraderError> {
        for (kind, w) in IndicatorKind::ALL.iter().zip(self.as_array()) {
            if !w.is_finite() {
                return Err(TurbotraderError::WeightInvariantViolation {
                    reason: format!("{} weight is not finite", kind.category()),
                });
            }
            if w < 0.0 {
                return Err(TurbotraderError::WeightInvariantViolation {
                    reason: format!("{} weight {} is negative", kind.category(), w),
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(TurbotraderError::WeightInvariantViolation {
                reason: format!("weights sum to {sum}, expected 1"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for WeightVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price={:.4} volume={:.4} rsi={:.4} volatility={:.4}",
            self.price, self.volume, self.rsi, self.volatility
        )
    }
}

/// Process-wide current weights.
#[derive(Debug)]
pub struct WeightStore {
    current: RwLock<Arc<WeightVector>>,
}

impl WeightStore {
    pub fn new(initial: WeightVector) -> Result<Self, TurbotraderError> {
        initial.validate()?;
        Ok(WeightStore {
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Stable view for one scoring pass.
    pub fn snapshot(&self) -> Arc<WeightVector> {
        Arc::clone(&self.current.read())
    }

    /// Installs `next` if it satisfies the weight invariants; otherwise the
    /// prior vector stays in place.
    pub fn replace(&self, next: WeightVector) -> Result<Arc<WeightVector>, TurbotraderError> {
        if let Err(e) = next.validate() {
            tracing::error!(weights = %next, error = %e, "rejected weight update, keeping prior weights");
            return Err(e);
        }
        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);
        Ok(next)
    }

    /// Computes and installs a new vector from the current one under a single write lock.
    pub fn apply<F>(&self, f: F) -> Result<Arc<WeightVector>, TurbotraderError>
    where
        F: FnOnce(&WeightVector) -> Result<WeightVector, TurbotraderError>,
    {
        let mut guard = self.current.write();
        let current: &WeightVector = &guard;
        let next = f(current)?;
        if let Err(e) = next.validate() {
            tracing::error!(weights = %next, error = %e, "rejected weight update, keeping prior weights");
            return Err(e);
        }
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        Ok(next)
    }
}
