//! Per-timeframe weighted combination of normalized indicator scores.

use crate::domain::indicator::IndicatorKind;
use crate::domain::normalizer::{NEUTRAL_SCORE, NormalizedScores};
use crate::domain::weights::WeightVector;

/// Timeframe Score = sum(w_i * n_i) / sum(w_i).
///
/// Weights that do not sum to 1 are renormalized by their sum. A
/// non-positive or non-finite weight sum yields the neutral score.
pub fn timeframe_score(scores: &NormalizedScores, weights: &WeightVector) -> f64 {
    let weight_sum = weights.sum();
    if !weight_sum.is_finite() || weight_sum <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let weighted: f64 = IndicatorKind::ALL
        .iter()
        .map(|&kind| weights.get(kind) * scores.get(kind))
        .sum();
    (weighted / weight_sum).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scores() -> NormalizedScores {
        NormalizedScores {
            momentum: 80.0,
            volume_delta: 60.0,
            rsi: 40.0,
            volatility: 20.0,
        }
    }

    #[test]
    fn weighted_sum_with_unit_weights() {
        let score = timeframe_score(&scores(), &WeightVector::default());
        // 0.7*80 + 0.1*60 + 0.1*40 + 0.1*20
        assert_relative_eq!(score, 68.0, epsilon = 1e-9);
    }

    #[test]
    fn weights_not_summing_to_one_are_renormalized() {
        let doubled = WeightVector::from_array([1.4, 0.2, 0.2, 0.2]);
        assert_relative_eq!(
            timeframe_score(&scores(), &doubled),
            timeframe_score(&scores(), &WeightVector::default()),
            epsilon = 1e-9
        );

        let raw = WeightVector::from_array([1.0, 1.0, 1.0, 1.0]);
        assert_relative_eq!(timeframe_score(&scores(), &raw), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_weight_sum_is_neutral() {
        let zero = WeightVector::from_array([0.0; 4]);
        assert_eq!(timeframe_score(&scores(), &zero), NEUTRAL_SCORE);
    }

    #[test]
    fn neutral_inputs_give_neutral_output() {
        let score = timeframe_score(&NormalizedScores::neutral(), &WeightVector::default());
        assert_relative_eq!(score, 50.0, epsilon = 1e-12);
    }

    #[test]
    fn pure_function() {
        let w = WeightVector::from_array([0.3, 0.3, 0.2, 0.2]);
        let first = timeframe_score(&scores(), &w);
        for _ in 0..10 {
            assert_eq!(timeframe_score(&scores(), &w), first);
        }
    }
}
