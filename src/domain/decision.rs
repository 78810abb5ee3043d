//! Decision engine: threshold policy plus external confirmation, and
//! position sizing for confirmed buys.
//!
//! States:
//! - `AwaitingScore` -> `Decided(Hold)` when the composite is inside the band
//! - `AwaitingScore` -> `AwaitingConfirmation` when it crosses BUY or SELL
//! - `AwaitingConfirmation` -> `Decided` on a verdict; CONFIRM keeps the
//!   proposed action, REJECT, timeout and error all resolve to HOLD

use std::fmt;

use crate::domain::error::TurbotraderError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::scorer::AssetScore;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirm,
    Reject,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Confirm => f.write_str("CONFIRM"),
            Verdict::Reject => f.write_str("REJECT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// BUY when composite > buy.
    pub buy: f64,
    /// SELL when composite < sell.
    pub sell: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            buy: 70.0,
            sell: 30.0,
        }
    }
}

impl Thresholds {
    pub fn propose(&self, composite: f64) -> Action {
        if composite > self.buy {
            Action::Buy
        } else if composite < self.sell {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

/// Context submitted to the confirmation boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationRequest {
    pub asset: String,
    pub composite: f64,
    pub proposed: Action,
    pub indicators: Vec<(Timeframe, IndicatorSet)>,
    pub timeframe_scores: Vec<(Timeframe, f64)>,
}

impl ConfirmationRequest {
    pub fn from_score(score: &AssetScore, proposed: Action) -> Self {
        ConfirmationRequest {
            asset: score.asset.clone(),
            composite: score.composite,
            proposed,
            indicators: score
                .timeframes
                .iter()
                .map(|t| (t.timeframe, t.indicators))
                .collect(),
            timeframe_scores: score
                .timeframes
                .iter()
                .map(|t| (t.timeframe, t.score))
                .collect(),
        }
    }

    pub fn mean_rsi(&self) -> f64 {
        if self.indicators.is_empty() {
            return 50.0;
        }
        self.indicators.iter().map(|(_, set)| set.rsi).sum::<f64>() / self.indicators.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub composite: f64,
    /// `None` when the score never reached the confirmation boundary.
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionState {
    AwaitingScore,
    AwaitingConfirmation { composite: f64, proposed: Action },
    Decided(Decision),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEngine {
    pub thresholds: Thresholds,
}

impl DecisionEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        DecisionEngine { thresholds }
    }

    pub fn start(&self) -> DecisionState {
        DecisionState::AwaitingScore
    }

    pub fn on_score(&self, state: DecisionState, composite: f64) -> DecisionState {
        match state {
            DecisionState::AwaitingScore => match self.thresholds.propose(composite) {
                Action::Hold => DecisionState::Decided(Decision {
                    action: Action::Hold,
                    composite,
                    verdict: None,
                }),
                proposed => DecisionState::AwaitingConfirmation {
                    composite,
                    proposed,
                },
            },
            other => other,
        }
    }

    /// Resolves a pending confirmation. Any confirmation failure is a REJECT.
    pub fn on_verdict(
        &self,
        state: DecisionState,
        verdict: Result<Verdict, TurbotraderError>,
    ) -> DecisionState {
        match state {
            DecisionState::AwaitingConfirmation {
                composite,
                proposed,
            } => {
                let verdict = match verdict {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, %proposed, composite, "confirmation failed, treating as REJECT");
                        Verdict::Reject
                    }
                };
                let action = match verdict {
                    Verdict::Confirm => proposed,
                    Verdict::Reject => Action::Hold,
                };
                DecisionState::Decided(Decision {
                    action,
                    composite,
                    verdict: Some(verdict),
                })
            }
            other => other,
        }
    }

    /// Runs the state machine to completion, calling `confirm` only when a
    /// threshold is crossed.
    pub fn decide<F>(&self, score: &AssetScore, confirm: F) -> Decision
    where
        F: FnOnce(&ConfirmationRequest) -> Result<Verdict, TurbotraderError>,
    {
        let mut state = self.on_score(self.start(), score.composite);
        if let DecisionState::AwaitingConfirmation { proposed, .. } = state {
            let request = ConfirmationRequest::from_score(score, proposed);
            state = self.on_verdict(state, confirm(&request));
        }
        match state {
            DecisionState::Decided(decision) => decision,
            // on_verdict always resolves a pending confirmation
            _ => Decision {
                action: Action::Hold,
                composite: score.composite,
                verdict: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub account_fraction: f64,
    pub max_concurrent: usize,
    /// Quote balance that a buy may not dip below.
    pub min_balance: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        PositionSizer {
            account_fraction: 0.10,
            max_concurrent: 5,
            min_balance: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingOutcome {
    /// Quote amount to spend.
    Size(f64),
    LimitReached { open: usize, max: usize },
    BelowMinBalance { balance: f64, size: f64 },
}

impl PositionSizer {
    /// size = balance * fraction / (open + 1), counting the new position.
    pub fn size(&self, balance: f64, open_positions: usize) -> SizingOutcome {
        if open_positions >= self.max_concurrent {
            return SizingOutcome::LimitReached {
                open: open_positions,
                max: self.max_concurrent,
            };
        }
        let size = balance * self.account_fraction / (open_positions + 1) as f64;
        if size <= 0.0 || balance - size < self.min_balance {
            return SizingOutcome::BelowMinBalance { balance, size };
        }
        SizingOutcome::Size(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn score(composite: f64) -> AssetScore {
        AssetScore {
            asset: "BTCUSDT".into(),
            composite,
            timeframes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(Thresholds::default())
    }

    #[test]
    fn confirmed_buy() {
        let d = engine().decide(&score(75.0), |_| Ok(Verdict::Confirm));
        assert_eq!(d.action, Action::Buy);
        assert_eq!(d.verdict, Some(Verdict::Confirm));
        assert_eq!(d.composite, 75.0);
    }

    #[test]
    fn rejected_buy_holds() {
        let d = engine().decide(&score(75.0), |_| Ok(Verdict::Reject));
        assert_eq!(d.action, Action::Hold);
        assert_eq!(d.verdict, Some(Verdict::Reject));
    }

    #[test]
    fn neutral_score_holds_without_confirmation() {
        let mut called = false;
        let d = engine().decide(&score(50.0), |_| {
            called = true;
            Ok(Verdict::Confirm)
        });
        assert_eq!(d.action, Action::Hold);
        assert_eq!(d.verdict, None);
        assert!(!called);
    }

    #[test]
    fn thresholds_are_strict() {
        let t = Thresholds::default();
        assert_eq!(t.propose(70.0), Action::Hold);
        assert_eq!(t.propose(70.0001), Action::Buy);
        assert_eq!(t.propose(30.0), Action::Hold);
        assert_eq!(t.propose(29.9), Action::Sell);
    }

    #[test]
    fn confirmed_sell() {
        let d = engine().decide(&score(10.0), |req| {
            assert_eq!(req.proposed, Action::Sell);
            Ok(Verdict::Confirm)
        });
        assert_eq!(d.action, Action::Sell);
    }

    #[test]
    fn timeout_is_reject() {
        let d = engine().decide(&score(80.0), |req| {
            Err(TurbotraderError::ConfirmationTimeout {
                asset: req.asset.clone(),
                timeout_ms: 5,
            })
        });
        assert_eq!(d.action, Action::Hold);
        assert_eq!(d.verdict, Some(Verdict::Reject));
    }

    #[test]
    fn explicit_transitions() {
        let e = engine();
        let pending = e.on_score(e.start(), 90.0);
        assert_eq!(
            pending,
            DecisionState::AwaitingConfirmation {
                composite: 90.0,
                proposed: Action::Buy
            }
        );
        let decided = e.on_verdict(
            pending,
            Err(TurbotraderError::ConfirmationError {
                asset: "X".into(),
                reason: "boom".into(),
            }),
        );
        assert!(matches!(
            decided,
            DecisionState::Decided(Decision {
                action: Action::Hold,
                ..
            })
        ));
        // decided state ignores further input
        assert_eq!(e.on_score(decided, 95.0), decided);
        assert_eq!(e.on_verdict(decided, Ok(Verdict::Confirm)), decided);
    }

    #[test]
    fn sizing_divides_by_open_count_including_new() {
        let sizer = PositionSizer::default();
        match sizer.size(3000.0, 2) {
            SizingOutcome::Size(s) => assert_relative_eq!(s, 3000.0 * 0.10 / 3.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sixth_position_is_refused() {
        let sizer = PositionSizer::default();
        assert_eq!(
            sizer.size(10_000.0, 5),
            SizingOutcome::LimitReached { open: 5, max: 5 }
        );
        assert!(matches!(sizer.size(10_000.0, 4), SizingOutcome::Size(_)));
    }

    #[test]
    fn min_balance_floor() {
        let sizer = PositionSizer::default();
        assert!(matches!(
            sizer.size(10.5, 0),
            SizingOutcome::BelowMinBalance { .. }
        ));
        assert!(matches!(sizer.size(0.0, 0), SizingOutcome::BelowMinBalance { .. }));
    }
}
