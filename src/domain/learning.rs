//! Adaptive weights from realized trade outcomes.
//!
//! Each indicator gets an "edge": how far its normalized entry value sat
//! above neutral on winning trades and below neutral on losing ones,
//!
//!   edge_i = mean over trades of s * (n_i - 50) / 50,  s = +1 win, -1 loss
//!
//! so edge_i lies in [-1, 1]. Weights are scaled multiplicatively,
//!
//!   w_i' = w_i * exp(rate * edge_i)
//!
//! floored at `min_weight` and renormalized. `rate` is `learning_rate` when
//! the batch win rate is under target and the smaller `reinforce_rate`
//! otherwise. The rule is monotonic in the edge and bounded by
//! `exp(±rate)` per update. An empty batch leaves the weights untouched.

use crate::domain::error::TurbotraderError;
use crate::domain::indicator::IndicatorKind;
use crate::domain::normalizer::NEUTRAL_SCORE;
use crate::domain::outcome::{OutcomeSummary, TradeOutcome};
use crate::domain::weights::WeightVector;

#[derive(Debug, Clone, PartialEq)]
pub struct LearningConfig {
    /// Pending outcomes needed before an update runs.
    pub min_trades: usize,
    pub target_win_rate: f64,
    pub learning_rate: f64,
    pub reinforce_rate: f64,
    pub min_weight: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            min_trades: 10,
            target_win_rate: 0.55,
            learning_rate: 0.5,
            reinforce_rate: 0.1,
            min_weight: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningUpdate {
    pub previous: WeightVector,
    pub next: WeightVector,
    pub win_rate: f64,
    /// Per-indicator edge in `IndicatorKind::index()` order.
    pub edges: [f64; 4],
    pub trades: usize,
}

/// Per-indicator edge over a batch; zeros when empty.
pub fn indicator_edges(outcomes: &[TradeOutcome]) -> [f64; 4] {
    let mut edges = [0.0; 4];
    if outcomes.is_empty() {
        return edges;
    }
    for outcome in outcomes {
        let sign = if outcome.win { 1.0 } else { -1.0 };
        for kind in IndicatorKind::ALL {
            let deviation = (outcome.entry_features.get(kind) - NEUTRAL_SCORE) / NEUTRAL_SCORE;
            edges[kind.index()] += sign * deviation.clamp(-1.0, 1.0);
        }
    }
    let n = outcomes.len() as f64;
    edges.map(|e| e / n)
}

/// Applies one batch to `weights`. Fails with `WeightInvariantViolation`
/// when the result cannot be renormalized; the caller keeps the prior vector.
pub fn adapt_weights(
    weights: &WeightVector,
    outcomes: &[TradeOutcome],
    config: &LearningConfig,
) -> Result<LearningUpdate, TurbotraderError> {
    let summary = OutcomeSummary::from_outcomes(outcomes);
    if outcomes.is_empty() {
        return Ok(LearningUpdate {
            previous: *weights,
            next: *weights,
            win_rate: summary.win_rate,
            edges: [0.0; 4],
            trades: 0,
        });
    }

    let edges = indicator_edges(outcomes);
    let rate = if summary.win_rate < config.target_win_rate {
        config.learning_rate
    } else {
        config.reinforce_rate
    };

    let mut scaled = weights.as_array();
    for (w, edge) in scaled.iter_mut().zip(edges) {
        *w = (*w * (rate * edge).exp()).max(config.min_weight);
    }
    let next = WeightVector::from_array(scaled).renormalized();
    next.validate()?;

    Ok(LearningUpdate {
        previous: *weights,
        next,
        win_rate: summary.win_rate,
        edges,
        trades: outcomes.len(),
    })
}

/// Buffers outcomes until enough have accumulated for an update. Each
/// outcome is consumed by exactly one update.
#[derive(Debug, Clone, Default)]
pub struct LearningModule {
    pub config: LearningConfig,
    pending: Vec<TradeOutcome>,
}

impl LearningModule {
    pub fn new(config: LearningConfig) -> Self {
        LearningModule {
            config,
            pending: Vec::new(),
        }
    }

    pub fn observe(&mut self, outcome: TradeOutcome) {
        self.pending.push(outcome);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drains the buffer into an update once `min_trades` outcomes are pending.
    /// On failure the drained batch is put back.
    pub fn update(
        &mut self,
        weights: &WeightVector,
    ) -> Result<Option<LearningUpdate>, TurbotraderError> {
        if self.pending.is_empty() || self.pending.len() < self.config.min_trades {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.pending);
        match adapt_weights(weights, &batch, &self.config) {
            Ok(update) => {
                tracing::info!(
                    trades = update.trades,
                    win_rate = update.win_rate,
                    previous = %update.previous,
                    next = %update.next,
                    "weights adapted"
                );
                Ok(Some(update))
            }
            Err(e) => {
                self.pending = batch;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalizer::NormalizedScores;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn outcome(win: bool, features: NormalizedScores) -> TradeOutcome {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TradeOutcome {
            asset: "BTCUSDT".into(),
            entry_score: 75.0,
            exit_score: 25.0,
            entry_price: 100.0,
            exit_price: if win { 110.0 } else { 90.0 },
            quantity: 1.0,
            pnl: if win { 10.0 } else { -10.0 },
            win,
            entry_timestamp: ts,
            timestamp: ts,
            entry_features: features,
        }
    }

    fn features(momentum: f64, volume_delta: f64, rsi: f64, volatility: f64) -> NormalizedScores {
        NormalizedScores {
            momentum,
            volume_delta,
            rsi,
            volatility,
        }
    }

    #[test]
    fn empty_batch_is_exact_noop() {
        let w = WeightVector::from_array([0.4, 0.3, 0.2, 0.1]);
        let update = adapt_weights(&w, &[], &LearningConfig::default()).unwrap();
        assert_eq!(update.next, w);
        assert_eq!(update.trades, 0);

        let mut module = LearningModule::new(LearningConfig {
            min_trades: 0,
            ..LearningConfig::default()
        });
        assert_eq!(module.update(&w).unwrap(), None);
    }

    #[test]
    fn edges_follow_winners_and_losers() {
        let batch = vec![
            outcome(true, features(90.0, 50.0, 30.0, 50.0)),
            outcome(false, features(10.0, 50.0, 70.0, 50.0)),
        ];
        let edges = indicator_edges(&batch);
        assert_relative_eq!(edges[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(edges[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(edges[2], -0.4, epsilon = 1e-12);
    }

    #[test]
    fn losing_batch_shifts_weight_toward_edge() {
        // momentum high on the winner, low on the losers; rsi the reverse
        let batch = vec![
            outcome(true, features(90.0, 50.0, 20.0, 50.0)),
            outcome(false, features(20.0, 50.0, 90.0, 50.0)),
            outcome(false, features(30.0, 50.0, 80.0, 50.0)),
        ];
        let w = WeightVector::from_array([0.25, 0.25, 0.25, 0.25]);
        let update = adapt_weights(&w, &batch, &LearningConfig::default()).unwrap();
        assert!(update.win_rate < 0.55);
        assert!(update.next.price > w.price);
        assert!(update.next.rsi < w.rsi);
        assert_relative_eq!(update.next.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn winning_batch_uses_smaller_rate() {
        let batch: Vec<_> = (0..4)
            .map(|_| outcome(true, features(80.0, 50.0, 50.0, 50.0)))
            .collect();
        let w = WeightVector::from_array([0.25, 0.25, 0.25, 0.25]);
        let reinforce = adapt_weights(&w, &batch, &LearningConfig::default()).unwrap();
        let aggressive = adapt_weights(
            &w,
            &batch,
            &LearningConfig {
                target_win_rate: 1.1,
                ..LearningConfig::default()
            },
        )
        .unwrap();
        assert!(reinforce.next.price > w.price);
        assert!(aggressive.next.price > reinforce.next.price);
    }

    #[test]
    fn floor_keeps_weights_alive() {
        let batch: Vec<_> = (0..10)
            .map(|_| outcome(false, features(50.0, 100.0, 50.0, 50.0)))
            .collect();
        let w = WeightVector::from_array([0.3, 0.02, 0.3, 0.38]);
        let config = LearningConfig {
            learning_rate: 50.0,
            ..LearningConfig::default()
        };
        let update = adapt_weights(&w, &batch, &config).unwrap();
        assert!(update.next.volume > 0.0);
        assert!(update.next.validate().is_ok());
    }

    #[test]
    fn module_waits_for_min_trades_then_drains() {
        let mut module = LearningModule::new(LearningConfig {
            min_trades: 3,
            ..LearningConfig::default()
        });
        let w = WeightVector::default();
        module.observe(outcome(true, features(80.0, 50.0, 50.0, 50.0)));
        module.observe(outcome(false, features(30.0, 50.0, 50.0, 50.0)));
        assert_eq!(module.update(&w).unwrap(), None);
        assert_eq!(module.pending(), 2);

        module.observe(outcome(true, features(70.0, 50.0, 50.0, 50.0)));
        let update = module.update(&w).unwrap().unwrap();
        assert_eq!(update.trades, 3);
        assert_eq!(module.pending(), 0);
        assert_eq!(module.update(&update.next).unwrap(), None);
    }

    fn score_strategy() -> impl Strategy<Value = f64> {
        0.0f64..=100.0
    }

    proptest! {
        #[test]
        fn updates_preserve_weight_invariants(
            raw in prop::array::uniform4(0.01f64..1.0),
            trades in prop::collection::vec(
                (any::<bool>(), score_strategy(), score_strategy(), score_strategy(), score_strategy()),
                1..30,
            ),
        ) {
            let w = WeightVector::from_array(raw).renormalized();
            let batch: Vec<_> = trades
                .into_iter()
                .map(|(win, m, v, r, s)| outcome(win, features(m, v, r, s)))
                .collect();
            let update = adapt_weights(&w, &batch, &LearningConfig::default()).unwrap();
            prop_assert!((update.next.sum() - 1.0).abs() <= 1e-9);
            prop_assert!(update.next.as_array().iter().all(|&x| x >= 0.0));
        }
    }
}
