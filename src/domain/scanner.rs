//! Continuous scanning over a set of assets.
//!
//! Each cycle takes one weight snapshot, runs every asset independently,
//! then feeds closed trades to the learning module and installs the new
//! weights between cycles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::domain::decision::{ConfirmationRequest, Verdict};
use crate::domain::error::TurbotraderError;
use crate::domain::learning::{LearningModule, LearningUpdate};
use crate::domain::normalizer::NEUTRAL_SCORE;
use crate::domain::ohlcv::{OhlcvBar, validate_series};
use crate::domain::outcome::TradeOutcome;
use crate::domain::portfolio::Portfolio;
use crate::domain::timeframe::Timeframe;
use crate::domain::trader::{ClosedPositions, CycleReport, Trader};
use crate::domain::weights::{WeightStore, WeightVector};
use crate::ports::confirmation_port::ConfirmationPort;
use crate::ports::decision_sink::DecisionSink;
use crate::ports::execution_port::{ExecutionPort, Fill, OrderRequest};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::outcome_archive_port::OutcomeArchive;
use crate::ports::weight_repository_port::WeightRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "running" => Some(RunState::Running),
            "stopped" => Some(RunState::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub assets: Vec<String>,
    /// Bars requested per timeframe.
    pub fetch_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            assets: ["BTCUSDT", "ETHUSDT", "BNBUSDT", "ADAUSDT", "SOLUSDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fetch_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub reports: Vec<CycleReport>,
    /// Assets skipped this cycle, with the reason.
    pub skipped: Vec<(String, String)>,
    pub weight_update: Option<LearningUpdate>,
}

/// Fetches every timeframe for `asset`. Any missing timeframe fails the whole
/// asset.
pub fn fetch_series(
    market_data: &dyn MarketDataPort,
    asset: &str,
    timeframes: &[Timeframe],
    limit: usize,
) -> Result<BTreeMap<Timeframe, Vec<OhlcvBar>>, TurbotraderError> {
    let mut series = BTreeMap::new();
    for &timeframe in timeframes {
        let bars = market_data.fetch_ohlcv(asset, timeframe, limit)?;
        validate_series(&bars)?;
        series.insert(timeframe, bars);
    }
    Ok(series)
}

/// Collaborators for live scanning.
pub struct ScannerPorts<'a> {
    pub market_data: &'a dyn MarketDataPort,
    pub confirmation: &'a dyn ConfirmationPort,
    pub execution: &'a dyn ExecutionPort,
    pub archive: &'a dyn OutcomeArchive,
    pub weights: &'a WeightStore,
    pub weight_repository: Option<&'a dyn WeightRepository>,
}

struct LiveSink<'s, 'a> {
    ports: &'s ScannerPorts<'a>,
    learning: &'s mut LearningModule,
    unarchived: &'s mut Vec<TradeOutcome>,
}

impl DecisionSink for LiveSink<'_, '_> {
    fn confirm(&mut self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        self.ports.confirmation.confirm(request)
    }

    fn execute(&mut self, order: &OrderRequest) -> Result<Fill, TurbotraderError> {
        self.ports.execution.submit(order)
    }

    /// The position is already closed here, so the outcome goes to learning
    /// first. A failed append is queued and retried next cycle.
    fn record_outcome(&mut self, outcome: TradeOutcome) -> Result<(), TurbotraderError> {
        self.learning.observe(outcome.clone());
        if let Err(e) = self.ports.archive.append(&outcome) {
            tracing::error!(asset = %outcome.asset, error = %e, "archive append failed, queued for retry");
            self.unarchived.push(outcome);
        }
        Ok(())
    }
}

pub struct Scanner<'a> {
    pub config: ScannerConfig,
    ports: ScannerPorts<'a>,
    trader: Trader,
    learning: LearningModule,
    last_prices: BTreeMap<String, (f64, NaiveDateTime)>,
    unarchived: Vec<TradeOutcome>,
}

impl<'a> Scanner<'a> {
    pub fn new(config: ScannerConfig, trader: Trader, learning: LearningModule, ports: ScannerPorts<'a>) -> Self {
        Scanner {
            config,
            ports,
            trader,
            learning,
            last_prices: BTreeMap::new(),
            unarchived: Vec::new(),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.trader.portfolio
    }

    pub fn pending_outcomes(&self) -> usize {
        self.learning.pending()
    }

    /// Closed trades still waiting for a successful archive append.
    pub fn unarchived_outcomes(&self) -> usize {
        self.unarchived.len()
    }

    fn scan_asset(
        &mut self,
        asset: &str,
        weights: &WeightVector,
    ) -> Result<CycleReport, TurbotraderError> {
        let series = fetch_series(
            self.ports.market_data,
            asset,
            &self.trader.config.timeframes,
            self.config.fetch_limit,
        )?;
        if let Some(bar) = series.values().next().and_then(|bars| bars.last()) {
            self.ports.execution.observe_price(asset, bar.close);
            self.last_prices
                .insert(asset.to_string(), (bar.close, bar.timestamp));
        }
        let mut sink = LiveSink {
            ports: &self.ports,
            learning: &mut self.learning,
            unarchived: &mut self.unarchived,
        };
        self.trader.run_cycle(asset, &series, weights, &mut sink)
    }

    /// Retries queued archive appends in order, stopping at the first failure.
    fn flush_unarchived(&mut self) {
        while let Some(outcome) = self.unarchived.first() {
            if let Err(e) = self.ports.archive.append(outcome) {
                tracing::warn!(queued = self.unarchived.len(), error = %e, "archive still failing");
                return;
            }
            self.unarchived.remove(0);
        }
    }

    /// Runs pending outcomes through the learning module and installs the
    /// result. A rejected update keeps the prior weights; a failed save keeps
    /// the new weights in memory only.
    fn apply_learning(&mut self) -> Option<LearningUpdate> {
        let current = self.ports.weights.snapshot();
        let update = match self.learning.update(&current) {
            Ok(Some(update)) => update,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(error = %e, "learning update failed, keeping prior weights");
                return None;
            }
        };
        if self.ports.weights.replace(update.next).is_err() {
            return None;
        }
        if let Some(repository) = self.ports.weight_repository {
            if let Err(e) = repository.save(&update.next) {
                tracing::error!(error = %e, weights = %update.next, "failed to persist weights");
            }
        }
        Some(update)
    }

    /// One pass over every configured asset. Any failure skips that asset
    /// only.
    pub fn scan_cycle(&mut self) -> Result<CycleSummary, TurbotraderError> {
        self.flush_unarchived();
        let weights: Arc<WeightVector> = self.ports.weights.snapshot();
        let mut summary = CycleSummary::default();

        for asset in self.config.assets.clone() {
            match self.scan_asset(&asset, &weights) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    if e.is_skippable() {
                        tracing::warn!(asset = %asset, error = %e, "skipping asset this cycle");
                    } else {
                        tracing::error!(asset = %asset, error = %e, "asset cycle failed");
                    }
                    summary.skipped.push((asset, e.to_string()));
                }
            }
        }

        summary.weight_update = self.apply_learning();
        Ok(summary)
    }

    /// Closes every open position at its last seen price. Positions that
    /// cannot be closed are logged and left open.
    pub fn shutdown(&mut self) -> ClosedPositions {
        let mut sink = LiveSink {
            ports: &self.ports,
            learning: &mut self.learning,
            unarchived: &mut self.unarchived,
        };
        let closed = self
            .trader
            .close_all(&self.last_prices, NEUTRAL_SCORE, &mut sink);
        for asset in &closed.unpriced {
            tracing::warn!(asset = %asset, "no price seen, position left open");
        }
        self.apply_learning();
        self.flush_unarchived();
        closed
    }

    fn scan_until<C, P>(
        &mut self,
        keep_running: &mut C,
        max_cycles: Option<usize>,
        pause: &mut P,
        cycles: &mut usize,
    ) -> Result<(), TurbotraderError>
    where
        C: FnMut() -> Result<bool, TurbotraderError>,
        P: FnMut(),
    {
        while keep_running()? && max_cycles.is_none_or(|max| *cycles < max) {
            let summary = self.scan_cycle()?;
            *cycles += 1;
            tracing::info!(
                cycle = *cycles,
                decided = summary.reports.len(),
                skipped = summary.skipped.len(),
                "scan cycle complete"
            );
            if max_cycles.is_some_and(|max| *cycles >= max) {
                break;
            }
            pause();
        }
        Ok(())
    }

    /// Scans until `keep_running` says stop or `max_cycles` have run, calling
    /// `pause` between cycles. Shuts down whether or not the loop failed.
    pub fn run<C, P>(
        &mut self,
        mut keep_running: C,
        max_cycles: Option<usize>,
        mut pause: P,
    ) -> Result<usize, TurbotraderError>
    where
        C: FnMut() -> Result<bool, TurbotraderError>,
        P: FnMut(),
    {
        let mut cycles = 0;
        let looped = self.scan_until(&mut keep_running, max_cycles, &mut pause, &mut cycles);
        let closed = self.shutdown();
        tracing::info!(
            cycles,
            closed = closed.outcomes.len(),
            left_open = closed.unpriced.len() + closed.failed.len(),
            "scanner stopped"
        );
        looped.map(|()| cycles)
    }
}
