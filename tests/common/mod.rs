#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use turbotrader::adapters::memory::InMemoryArchive;
use turbotrader::domain::decision::{Action, ConfirmationRequest, Verdict};
use turbotrader::domain::error::TurbotraderError;
use turbotrader::domain::outcome::TradeOutcome;
pub use turbotrader::domain::ohlcv::OhlcvBar;
use turbotrader::domain::timeframe::Timeframe;
use turbotrader::ports::confirmation_port::ConfirmationPort;
use turbotrader::ports::execution_port::{ExecutionPort, Fill, OrderRequest};
use turbotrader::ports::market_data_port::MarketDataPort;
use turbotrader::ports::outcome_archive_port::OutcomeArchive;

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One bar per close, `timeframe` apart, constant volume.
pub fn bars_from_closes(timeframe: Timeframe, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start() + chrono::Duration::seconds(timeframe.duration_secs() * i as i64),
            open: close,
            high: close * 1.001,
            low: close * 0.999,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// `start * rate^i` for `len` bars.
pub fn geometric(start: f64, rate: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| start * rate.powi(i as i32)).collect()
}

/// Rally then slide, 60 bars per cycle.
pub fn wave(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let phase = i % 60;
            let leg = if phase < 30 { phase as f64 } else { (60 - phase) as f64 };
            100.0 + 3.0 * leg
        })
        .collect()
}

pub fn csv_text(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

/// Market data keyed by asset and timeframe; replaceable between cycles.
pub struct MockMarketData {
    series: Mutex<HashMap<(String, Timeframe), Vec<OhlcvBar>>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_series(self, asset: &str, timeframe: Timeframe, bars: Vec<OhlcvBar>) -> Self {
        self.set_series(asset, timeframe, bars);
        self
    }

    pub fn set_series(&self, asset: &str, timeframe: Timeframe, bars: Vec<OhlcvBar>) {
        self.series.lock().insert((asset.to_string(), timeframe), bars);
    }

    /// Same closes on every listed timeframe.
    pub fn set_trend(&self, asset: &str, timeframes: &[Timeframe], closes: &[f64]) {
        for &tf in timeframes {
            self.set_series(asset, tf, bars_from_closes(tf, closes));
        }
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, TurbotraderError> {
        let series = self.series.lock();
        let bars = series
            .get(&(asset.to_string(), timeframe))
            .ok_or_else(|| TurbotraderError::DataUnavailable {
                asset: asset.to_string(),
                timeframe: timeframe.to_string(),
                reason: "no mock series".into(),
            })?;
        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }
}

/// Replies from a script, then a fallback verdict. Records every request.
pub struct ScriptedConfirmation {
    replies: Mutex<VecDeque<Result<Verdict, TurbotraderError>>>,
    fallback: Verdict,
    pub requests: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedConfirmation {
    pub fn always(verdict: Verdict) -> Self {
        Self::scripted(Vec::new(), verdict)
    }

    pub fn scripted(replies: Vec<Result<Verdict, TurbotraderError>>, fallback: Verdict) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl ConfirmationPort for ScriptedConfirmation {
    fn confirm(&self, request: &ConfirmationRequest) -> Result<Verdict, TurbotraderError> {
        self.requests.lock().push(request.clone());
        self.replies.lock().pop_front().unwrap_or(Ok(self.fallback))
    }
}

/// Fills at the reference price and records orders. Listed assets fail.
pub struct RecordingExecution {
    pub orders: Mutex<Vec<OrderRequest>>,
    failing: Mutex<HashSet<String>>,
    balance: f64,
}

impl RecordingExecution {
    pub fn new(balance: f64) -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            balance,
        }
    }

    pub fn failing_for(self, asset: &str) -> Self {
        self.fail_asset(asset);
        self
    }

    /// Every later order for `asset` fails.
    pub fn fail_asset(&self, asset: &str) {
        self.failing.lock().insert(asset.to_string());
    }

    pub fn actions(&self) -> Vec<(String, Action)> {
        self.orders
            .lock()
            .iter()
            .map(|o| (o.asset.clone(), o.action))
            .collect()
    }
}

impl ExecutionPort for RecordingExecution {
    fn submit(&self, order: &OrderRequest) -> Result<Fill, TurbotraderError> {
        if self.failing.lock().contains(&order.asset) {
            return Err(TurbotraderError::ExecutionError {
                asset: order.asset.clone(),
                reason: "exchange rejected order".into(),
            });
        }
        let mut orders = self.orders.lock();
        orders.push(order.clone());
        Ok(Fill {
            filled_price: order.reference_price,
            quantity: order.quantity,
            order_id: format!("rec-{}", orders.len()),
        })
    }

    fn balance(&self) -> Result<f64, TurbotraderError> {
        Ok(self.balance)
    }
}

/// In-memory archive whose appends can be switched to fail.
pub struct FlakyArchive {
    inner: InMemoryArchive,
    failing: AtomicBool,
}

impl FlakyArchive {
    pub fn new() -> Self {
        Self {
            inner: InMemoryArchive::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl OutcomeArchive for FlakyArchive {
    fn append(&self, outcome: &TradeOutcome) -> Result<(), TurbotraderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TurbotraderError::Storage {
                reason: "disk full".into(),
            });
        }
        self.inner.append(outcome)
    }

    fn read_all(&self) -> Result<Vec<TradeOutcome>, TurbotraderError> {
        self.inner.read_all()
    }
}
