//! Append-only CSV archive of closed trades.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::error::TurbotraderError;
use crate::domain::normalizer::NormalizedScores;
use crate::domain::ohlcv::{format_timestamp, parse_timestamp};
use crate::domain::outcome::TradeOutcome;
use crate::ports::outcome_archive_port::OutcomeArchive;

#[derive(Debug, Serialize, Deserialize)]
struct OutcomeRow {
    asset: String,
    entry_timestamp: String,
    exit_timestamp: String,
    entry_score: f64,
    exit_score: f64,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    pnl: f64,
    win: bool,
    momentum: f64,
    volume_delta: f64,
    rsi: f64,
    volatility: f64,
}

impl From<&TradeOutcome> for OutcomeRow {
    fn from(o: &TradeOutcome) -> Self {
        OutcomeRow {
            asset: o.asset.clone(),
            entry_timestamp: format_timestamp(&o.entry_timestamp),
            exit_timestamp: format_timestamp(&o.timestamp),
            entry_score: o.entry_score,
            exit_score: o.exit_score,
            entry_price: o.entry_price,
            exit_price: o.exit_price,
            quantity: o.quantity,
            pnl: o.pnl,
            win: o.win,
            momentum: o.entry_features.momentum,
            volume_delta: o.entry_features.volume_delta,
            rsi: o.entry_features.rsi,
            volatility: o.entry_features.volatility,
        }
    }
}

impl TryFrom<OutcomeRow> for TradeOutcome {
    type Error = TurbotraderError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        let ts = |value: &str| {
            parse_timestamp(value).ok_or_else(|| TurbotraderError::Storage {
                reason: format!("invalid outcome timestamp '{value}'"),
            })
        };
        Ok(TradeOutcome {
            entry_timestamp: ts(&row.entry_timestamp)?,
            timestamp: ts(&row.exit_timestamp)?,
            asset: row.asset,
            entry_score: row.entry_score,
            exit_score: row.exit_score,
            entry_price: row.entry_price,
            exit_price: row.exit_price,
            quantity: row.quantity,
            pnl: row.pnl,
            win: row.win,
            entry_features: NormalizedScores {
                momentum: row.momentum,
                volume_delta: row.volume_delta,
                rsi: row.rsi,
                volatility: row.volatility,
            },
        })
    }
}

fn storage(e: impl std::fmt::Display) -> TurbotraderError {
    TurbotraderError::Storage {
        reason: e.to_string(),
    }
}

pub struct CsvOutcomeArchive {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvOutcomeArchive {
    pub fn new(path: PathBuf) -> Self {
        CsvOutcomeArchive {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

impl OutcomeArchive for CsvOutcomeArchive {
    fn append(&self, outcome: &TradeOutcome) -> Result<(), TurbotraderError> {
        let _guard = self.write_lock.lock();
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(OutcomeRow::from(outcome)).map_err(storage)?;
        writer.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<TradeOutcome>, TurbotraderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(storage)?;
        reader
            .deserialize::<OutcomeRow>()
            .map(|row| row.map_err(storage).and_then(TradeOutcome::try_from))
            .collect()
    }
}
