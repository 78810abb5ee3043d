//! Backtest harness: replays one historical series bar by bar through the
//! same trading cycle used live.
//!
//! Multi-timeframe views are resampled from the bars seen so far, so no step
//! looks ahead. Confirmation comes from a supplied deterministic policy and
//! orders fill at the replay bar's close. The run reads no clock and draws
//! no random numbers.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::decision::{Action, ConfirmationRequest, Verdict};
use crate::domain::error::TurbotraderError;
use crate::domain::normalizer::NEUTRAL_SCORE;
use crate::domain::ohlcv::{OhlcvBar, validate_series};
use crate::domain::outcome::{OutcomeSummary, TradeOutcome};
use crate::domain::resample::resample;
use crate::domain::strategy::StrategyConfig;
use crate::domain::timeframe::Timeframe;
use crate::domain::trader::Trader;
use crate::domain::weights::WeightVector;
use crate::ports::confirmation_port::ConfirmationPort;
use crate::ports::decision_sink::DecisionSink;
use crate::ports::execution_port::{Fill, OrderRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Interval of the input series.
    pub interval: Timeframe,
    pub days: u32,
    /// Base bars between decisions.
    pub step: usize,
    pub initial_capital: f64,
    pub min_timeframes: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            interval: Timeframe::H1,
            days: 30,
            step: 1,
            initial_capital: 10_000.0,
            min_timeframes: 1,
        }
    }
}

/// One replay step's signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFlag {
    pub timestamp: NaiveDateTime,
    /// `None` when too few timeframes had enough history.
    pub composite: Option<f64>,
    /// Decision engine output before portfolio rules.
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub outcomes: Vec<TradeOutcome>,
    pub summary: OutcomeSummary,
    pub flags: Vec<SignalFlag>,
    pub final_balance: f64,
}

/// Keeps the bars within `days` of the last bar.
pub fn trim_to_days(bars: &[OhlcvBar], days: u32) -> &[OhlcvBar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let cutoff = last.timestamp - chrono::Duration::days(i64::from(days));
    let start = bars.partition_point(|b| b.timestamp <= cutoff);
    &bars[start..]
}

struct BacktestSink<'a, P: ConfirmationPort> {
    policy: &'a P,
    price: f64,
    next_order: u64,
    outcomes: Vec<TradeOutcome>,
}

impl<P: ConfirmationPort> DecisionSink for BacktestSink<'_, P> {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        self.policy.confirm(request)
    }

    fn execute(&mut self, order: &OrderRequest) -> Result<Fill, TurbotraderError> {
        self.next_order += 1;
        let quantity = match order.action {
            Action::Buy => order.size / self.price,
            _ => order.quantity,
        };
        Ok(Fill {
            filled_price: self.price,
            quantity,
            order_id: format!("bt-{}", self.next_order),
        })
    }

    fn record_outcome(&mut self, outcome: TradeOutcome) -> Result<(), TurbotraderError> {
        self.outcomes.push(outcome);
        Ok(())
    }
}

/// Timeframes in the strategy that can be built from `interval` bars.
pub fn replay_timeframes(strategy: &StrategyConfig, interval: Timeframe) -> Vec<Timeframe> {
    strategy
        .timeframes
        .iter()
        .copied()
        .filter(|tf| tf.multiple_of(interval).is_some())
        .collect()
}

pub fn run_backtest<P: ConfirmationPort>(
    asset: &str,
    bars: &[OhlcvBar],
    strategy: &StrategyConfig,
    config: &BacktestConfig,
    weights: &WeightVector,
    policy: &P,
) -> Result<BacktestResult, TurbotraderError> {
    validate_series(bars)?;
    let timeframes = replay_timeframes(strategy, config.interval);
    if timeframes.is_empty() {
        return Err(TurbotraderError::InsufficientTimeframes {
            asset: asset.to_string(),
            usable: 0,
            minimum: config.min_timeframes,
        });
    }

    let mut replay_strategy = strategy.clone();
    replay_strategy.timeframes = timeframes.clone();
    replay_strategy.scoring.min_timeframes = config.min_timeframes;
    let warmup = replay_strategy.required_bars().saturating_sub(1);
    let step = config.step.max(1);

    let mut trader = Trader::new(replay_strategy, config.initial_capital);
    let mut sink = BacktestSink {
        policy,
        price: 0.0,
        next_order: 0,
        outcomes: Vec::new(),
    };
    let mut flags = Vec::new();
    let mut last_composite = None;

    tracing::info!(asset, bars = bars.len(), timeframes = timeframes.len(), "starting backtest");

    for i in (warmup..bars.len()).step_by(step) {
        let seen = &bars[..=i];
        let series: BTreeMap<Timeframe, Vec<OhlcvBar>> = timeframes
            .iter()
            .filter_map(|&tf| resample(seen, config.interval, tf).map(|b| (tf, b)))
            .collect();
        sink.price = bars[i].close;

        match trader.run_cycle(asset, &series, weights, &mut sink) {
            Ok(report) => {
                last_composite = Some(report.decision.composite);
                flags.push(SignalFlag {
                    timestamp: bars[i].timestamp,
                    composite: Some(report.decision.composite),
                    action: report.decision.action,
                });
            }
            Err(e @ TurbotraderError::InsufficientTimeframes { .. }) => {
                tracing::debug!(asset, timestamp = %bars[i].timestamp, error = %e, "step held");
                flags.push(SignalFlag {
                    timestamp: bars[i].timestamp,
                    composite: None,
                    action: Action::Hold,
                });
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(last) = bars.last() {
        sink.price = last.close;
        let exit_score = last_composite.unwrap_or(NEUTRAL_SCORE);
        trader.close_position(asset, last.close, exit_score, last.timestamp, &mut sink)?;
    }

    let summary = OutcomeSummary::from_outcomes(&sink.outcomes);
    tracing::info!(
        asset,
        trades = summary.trade_count,
        win_rate = summary.win_rate,
        total_pnl = summary.total_pnl,
        "backtest complete"
    );
    Ok(BacktestResult {
        outcomes: sink.outcomes,
        summary,
        flags,
        final_balance: trader.portfolio.cash,
    })
}
