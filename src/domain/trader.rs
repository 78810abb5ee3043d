//! One asset's trading cycle: score, decide, size, execute, record.
//!
//! The trader owns the portfolio and is generic over a `DecisionSink`, so
//! live trading and backtesting share all of the logic here.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::decision::{Action, Decision, DecisionEngine, SizingOutcome, Verdict};
use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::outcome::TradeOutcome;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::Position;
use crate::domain::scorer::{AssetScore, score_asset};
use crate::domain::strategy::StrategyConfig;
use crate::domain::timeframe::Timeframe;
use crate::domain::weights::WeightVector;
use crate::ports::decision_sink::DecisionSink;
use crate::ports::execution_port::{Fill, OrderRequest};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldReason {
    /// Composite inside the BUY/SELL band.
    InsideBand,
    /// Confirmation rejected, timed out or failed.
    Rejected,
    AlreadyHolding,
    NoPosition,
    PositionLimit { open: usize, max: usize },
    BelowMinBalance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub score: AssetScore,
    pub decision: Decision,
    /// Action actually taken; differs from `decision.action` when portfolio
    /// rules turn a signal into a hold.
    pub action: Action,
    pub hold_reason: Option<HoldReason>,
    pub price: f64,
    pub timestamp: NaiveDateTime,
    pub fill: Option<Fill>,
    pub outcome: Option<TradeOutcome>,
}

/// What `Trader::close_all` managed to close.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosedPositions {
    pub outcomes: Vec<TradeOutcome>,
    /// Positions left open because no price was known.
    pub unpriced: Vec<String>,
    /// Positions left open because the sell failed, with the reason.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Trader {
    pub config: StrategyConfig,
    engine: DecisionEngine,
    pub portfolio: Portfolio,
}

impl Trader {
    pub fn new(config: StrategyConfig, initial_capital: f64) -> Self {
        let engine = DecisionEngine::new(config.thresholds);
        Trader {
            config,
            engine,
            portfolio: Portfolio::new(initial_capital),
        }
    }

    pub fn run_cycle<S: DecisionSink>(
        &mut self,
        asset: &str,
        series: &BTreeMap<Timeframe, Vec<OhlcvBar>>,
        weights: &WeightVector,
        sink: &mut S,
    ) -> Result<CycleReport, TurbotraderError> {
        let score = score_asset(asset, series, &self.config.scoring, weights)?;
        let (price, timestamp) = latest_price(&score, series)?;

        let decision = self.engine.decide(&score, |request| sink.confirm(request));
        tracing::info!(
            asset,
            composite = score.composite,
            action = %decision.action,
            verdict = ?decision.verdict,
            "decision"
        );

        let mut report = CycleReport {
            score,
            decision,
            action: Action::Hold,
            hold_reason: None,
            price,
            timestamp,
            fill: None,
            outcome: None,
        };

        match decision.action {
            Action::Hold => {
                report.hold_reason = Some(match decision.verdict {
                    Some(Verdict::Reject) => HoldReason::Rejected,
                    _ => HoldReason::InsideBand,
                });
            }
            Action::Buy => self.buy(asset, &mut report, sink)?,
            Action::Sell => {
                if !self.portfolio.has_position(asset) {
                    report.hold_reason = Some(HoldReason::NoPosition);
                } else {
                    let (fill, outcome) =
                        self.sell(asset, price, decision.composite, timestamp, sink)?;
                    report.action = Action::Sell;
                    report.fill = Some(fill);
                    report.outcome = Some(outcome);
                }
            }
        }
        Ok(report)
    }

    fn buy<S: DecisionSink>(
        &mut self,
        asset: &str,
        report: &mut CycleReport,
        sink: &mut S,
    ) -> Result<(), TurbotraderError> {
        if self.portfolio.has_position(asset) {
            report.hold_reason = Some(HoldReason::AlreadyHolding);
            return Ok(());
        }
        let size = match self
            .config
            .sizer
            .size(self.portfolio.cash, self.portfolio.position_count())
        {
            SizingOutcome::Size(size) => size,
            SizingOutcome::LimitReached { open, max } => {
                tracing::info!(asset, open, max, "position limit reached, holding");
                report.hold_reason = Some(HoldReason::PositionLimit { open, max });
                return Ok(());
            }
            SizingOutcome::BelowMinBalance { balance, size } => {
                tracing::info!(asset, balance, size, "balance below minimum, holding");
                report.hold_reason = Some(HoldReason::BelowMinBalance);
                return Ok(());
            }
        };

        let order = OrderRequest {
            asset: asset.to_string(),
            action: Action::Buy,
            size,
            quantity: size / report.price,
            reference_price: report.price,
        };
        let fill = sink.execute(&order)?;
        tracing::info!(asset, price = fill.filled_price, quantity = fill.quantity, order_id = %fill.order_id, "bought");

        self.portfolio.open(Position {
            asset: asset.to_string(),
            quantity: fill.quantity,
            entry_price: fill.filled_price,
            entry_score: report.decision.composite,
            entry_features: report.score.mean_features(),
            entry_timestamp: report.timestamp,
            order_id: fill.order_id.clone(),
        })?;
        report.action = Action::Buy;
        report.fill = Some(fill);
        Ok(())
    }

    fn sell<S: DecisionSink>(
        &mut self,
        asset: &str,
        price: f64,
        exit_score: f64,
        timestamp: NaiveDateTime,
        sink: &mut S,
    ) -> Result<(Fill, TradeOutcome), TurbotraderError> {
        let quantity = self
            .portfolio
            .get_position(asset)
            .map(|p| p.quantity)
            .ok_or_else(|| TurbotraderError::ExecutionError {
                asset: asset.to_string(),
                reason: "no open position".into(),
            })?;
        let order = OrderRequest {
            asset: asset.to_string(),
            action: Action::Sell,
            size: quantity * price,
            quantity,
            reference_price: price,
        };
        let fill = sink.execute(&order)?;
        let outcome = self
            .portfolio
            .close(asset, fill.filled_price, exit_score, timestamp)
            .ok_or_else(|| TurbotraderError::ExecutionError {
                asset: asset.to_string(),
                reason: "position vanished during close".into(),
            })?;
        tracing::info!(asset, price = fill.filled_price, pnl = outcome.pnl, win = outcome.win, "sold");
        sink.record_outcome(outcome.clone())?;
        Ok((fill, outcome))
    }

    /// Sells an open position outside the decision flow, e.g. on shutdown or
    /// at the end of a replay.
    pub fn close_position<S: DecisionSink>(
        &mut self,
        asset: &str,
        price: f64,
        exit_score: f64,
        timestamp: NaiveDateTime,
        sink: &mut S,
    ) -> Result<Option<TradeOutcome>, TurbotraderError> {
        if !self.portfolio.has_position(asset) {
            return Ok(None);
        }
        let (_, outcome) = self.sell(asset, price, exit_score, timestamp, sink)?;
        Ok(Some(outcome))
    }

    /// Closes every open position at the given prices. A position without a
    /// price or whose sell fails stays open and is reported by asset; the
    /// rest are still closed.
    pub fn close_all<S: DecisionSink>(
        &mut self,
        prices: &BTreeMap<String, (f64, NaiveDateTime)>,
        exit_score: f64,
        sink: &mut S,
    ) -> ClosedPositions {
        let assets: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        let mut closed = ClosedPositions::default();
        for asset in assets {
            let Some(&(price, timestamp)) = prices.get(&asset) else {
                closed.unpriced.push(asset);
                continue;
            };
            match self.close_position(&asset, price, exit_score, timestamp, sink) {
                Ok(Some(outcome)) => closed.outcomes.push(outcome),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(asset = %asset, error = %e, "failed to close position");
                    closed.failed.push((asset, e.to_string()));
                }
            }
        }
        closed
    }
}

/// Last close of the finest scored timeframe.
fn latest_price(
    score: &AssetScore,
    series: &BTreeMap<Timeframe, Vec<OhlcvBar>>,
) -> Result<(f64, NaiveDateTime), TurbotraderError> {
    let bar = score
        .timeframes
        .first()
        .and_then(|t| series.get(&t.timeframe))
        .and_then(|bars| bars.last())
        .ok_or_else(|| TurbotraderError::InvalidSeries {
            reason: format!("no bars to price {}", score.asset),
        })?;
    if !(bar.close.is_finite() && bar.close > 0.0) {
        return Err(TurbotraderError::InvalidSeries {
            reason: format!("non-positive close {} for {}", bar.close, score.asset),
        });
    }
    Ok((bar.close, bar.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::scorer::ScoringConfig;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct TestSink {
        verdict: Option<Verdict>,
        fail_execution: bool,
        fail_sells_for: Option<String>,
        orders: Vec<OrderRequest>,
        outcomes: Vec<TradeOutcome>,
        confirmations: usize,
    }

    impl DecisionSink for TestSink {
        fn confirm(
            &mut self,
            _request: &crate::domain::decision::ConfirmationRequest,
        ) -> Result<Verdict, TurbotraderError> {
            self.confirmations += 1;
            Ok(self.verdict.unwrap_or(Verdict::Confirm))
        }

        fn execute(&mut self, order: &OrderRequest) -> Result<Fill, TurbotraderError> {
            let failing_sell = order.action == Action::Sell
                && self.fail_sells_for.as_deref() == Some(order.asset.as_str());
            if self.fail_execution || failing_sell {
                return Err(TurbotraderError::ExecutionError {
                    asset: order.asset.clone(),
                    reason: "rejected".into(),
                });
            }
            self.orders.push(order.clone());
            Ok(Fill {
                filled_price: order.reference_price,
                quantity: order.quantity,
                order_id: format!("t-{}", self.orders.len()),
            })
        }

        fn record_outcome(&mut self, outcome: TradeOutcome) -> Result<(), TurbotraderError> {
            self.outcomes.push(outcome);
            Ok(())
        }
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            timeframes: vec![Timeframe::H1],
            scoring: ScoringConfig {
                min_timeframes: 1,
                ..ScoringConfig::default()
            },
            ..StrategyConfig::default()
        }
    }

    fn series(closes: &[f64]) -> BTreeMap<Timeframe, Vec<OhlcvBar>> {
        let mut map = BTreeMap::new();
        map.insert(Timeframe::H1, make_bars(closes));
        map
    }

    fn rising() -> Vec<f64> {
        (0..30).map(|i| 100.0 + 2.0 * i as f64).collect()
    }

    fn falling() -> Vec<f64> {
        (0..30).map(|i| 200.0 - 2.0 * i as f64).collect()
    }

    #[test]
    fn strong_uptrend_buys_and_sizes() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        let report = trader
            .run_cycle("BTCUSDT", &series(&rising()), &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(report.decision.action, Action::Buy);
        assert_eq!(report.action, Action::Buy);
        assert_eq!(sink.orders.len(), 1);
        assert_relative_eq!(sink.orders[0].size, 100.0);
        assert_relative_eq!(trader.portfolio.cash, 900.0, epsilon = 1e-9);
        assert!(trader.portfolio.has_position("BTCUSDT"));
    }

    #[test]
    fn buy_while_holding_is_hold() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        let s = series(&rising());
        trader.run_cycle("BTCUSDT", &s, &WeightVector::default(), &mut sink).unwrap();
        let again = trader
            .run_cycle("BTCUSDT", &s, &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(again.action, Action::Hold);
        assert_eq!(again.hold_reason, Some(HoldReason::AlreadyHolding));
        assert_eq!(sink.orders.len(), 1);
    }

    #[test]
    fn sell_closes_and_records_outcome() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        trader
            .run_cycle("BTCUSDT", &series(&rising()), &WeightVector::default(), &mut sink)
            .unwrap();
        let report = trader
            .run_cycle("BTCUSDT", &series(&falling()), &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(report.action, Action::Sell);
        let outcome = report.outcome.unwrap();
        assert_eq!(sink.outcomes.len(), 1);
        assert_eq!(sink.outcomes[0], outcome);
        assert!(!trader.portfolio.has_position("BTCUSDT"));
        // bought at 158, sold at 142
        assert!(!outcome.win);
        assert!(outcome.entry_score > 70.0);
        assert!(outcome.exit_score < 30.0);
    }

    #[test]
    fn sell_without_position_is_hold() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        let report = trader
            .run_cycle("BTCUSDT", &series(&falling()), &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(report.decision.action, Action::Sell);
        assert_eq!(report.action, Action::Hold);
        assert_eq!(report.hold_reason, Some(HoldReason::NoPosition));
        assert!(sink.orders.is_empty());
    }

    #[test]
    fn rejection_holds() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink {
            verdict: Some(Verdict::Reject),
            ..TestSink::default()
        };
        let report = trader
            .run_cycle("BTCUSDT", &series(&rising()), &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(report.hold_reason, Some(HoldReason::Rejected));
        assert_eq!(sink.confirmations, 1);
    }

    #[test]
    fn position_limit_forces_hold() {
        let mut cfg = config();
        cfg.sizer.max_concurrent = 1;
        let mut trader = Trader::new(cfg, 1000.0);
        let mut sink = TestSink::default();
        let s = series(&rising());
        trader.run_cycle("BTCUSDT", &s, &WeightVector::default(), &mut sink).unwrap();
        let report = trader
            .run_cycle("ETHUSDT", &s, &WeightVector::default(), &mut sink)
            .unwrap();
        assert_eq!(
            report.hold_reason,
            Some(HoldReason::PositionLimit { open: 1, max: 1 })
        );
    }

    #[test]
    fn execution_error_propagates_without_opening() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink {
            fail_execution: true,
            ..TestSink::default()
        };
        let err = trader
            .run_cycle("BTCUSDT", &series(&rising()), &WeightVector::default(), &mut sink)
            .unwrap_err();
        assert!(matches!(err, TurbotraderError::ExecutionError { .. }));
        assert!(!trader.portfolio.has_position("BTCUSDT"));
        assert_eq!(trader.portfolio.cash, 1000.0);
    }

    #[test]
    fn close_all_uses_known_prices() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        let s = series(&rising());
        trader.run_cycle("BTCUSDT", &s, &WeightVector::default(), &mut sink).unwrap();
        trader.run_cycle("ETHUSDT", &s, &WeightVector::default(), &mut sink).unwrap();

        let ts = s[&Timeframe::H1].last().unwrap().timestamp;
        let mut prices = BTreeMap::new();
        prices.insert("BTCUSDT".to_string(), (170.0, ts));
        let closed = trader.close_all(&prices, 50.0, &mut sink);
        assert_eq!(closed.outcomes.len(), 1);
        assert!(closed.outcomes[0].win);
        assert_eq!(closed.unpriced, vec!["ETHUSDT".to_string()]);
        assert!(closed.failed.is_empty());
    }

    #[test]
    fn close_all_continues_past_failed_sell() {
        let mut trader = Trader::new(config(), 1000.0);
        let mut sink = TestSink::default();
        let s = series(&rising());
        trader.run_cycle("AAAUSDT", &s, &WeightVector::default(), &mut sink).unwrap();
        trader.run_cycle("BBBUSDT", &s, &WeightVector::default(), &mut sink).unwrap();

        let ts = s[&Timeframe::H1].last().unwrap().timestamp;
        let mut prices = BTreeMap::new();
        prices.insert("AAAUSDT".to_string(), (170.0, ts));
        prices.insert("BBBUSDT".to_string(), (170.0, ts));
        sink.fail_sells_for = Some("AAAUSDT".to_string());

        let closed = trader.close_all(&prices, 50.0, &mut sink);
        assert_eq!(closed.outcomes.len(), 1);
        assert_eq!(closed.outcomes[0].asset, "BBBUSDT");
        assert_eq!(closed.failed.len(), 1);
        assert_eq!(closed.failed[0].0, "AAAUSDT");
        assert!(trader.portfolio.has_position("AAAUSDT"));
        assert!(!trader.portfolio.has_position("BBBUSDT"));
    }
}
