//! CSV file market data adapter.
//!
//! One file per asset and timeframe, `<ASSET>_<timeframe>.csv`, with header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::{OhlcvBar, parse_timestamp, validate_series};
use crate::domain::timeframe::Timeframe;
use crate::ports::market_data_port::MarketDataPort;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, asset: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", asset, timeframe))
    }

    /// Assets that have a file for `timeframe`.
    pub fn list_assets(&self, timeframe: Timeframe) -> Result<Vec<String>, TurbotraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TurbotraderError::Storage {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut assets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TurbotraderError::Storage {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(asset) = name_str.strip_suffix(&suffix) {
                assets.push(asset.to_string());
            }
        }
        assets.sort();
        Ok(assets)
    }
}

fn field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {name} column"))?
        .trim()
        .parse()
        .map_err(|e| format!("invalid {name} value: {e}"))
}

/// Reads a whole OHLCV file, sorted by timestamp and checked for duplicates.
pub fn read_series(path: &Path) -> Result<Vec<OhlcvBar>, TurbotraderError> {
    let content = fs::read_to_string(path)?;
    parse_series(&content).map_err(|reason| TurbotraderError::InvalidSeries {
        reason: format!("{}: {}", path.display(), reason),
    })
}

fn parse_series(content: &str) -> Result<Vec<OhlcvBar>, String> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("CSV parse error: {e}"))?;
        let ts_str = record.get(0).ok_or("missing timestamp column")?;
        let timestamp = parse_timestamp(ts_str)
            .ok_or_else(|| format!("row {}: invalid timestamp '{}'", line + 1, ts_str))?;
        bars.push(OhlcvBar {
            timestamp,
            open: field(&record, 1, "open")?,
            high: field(&record, 2, "high")?,
            low: field(&record, 3, "low")?,
            close: field(&record, 4, "close")?,
            volume: field(&record, 5, "volume")?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    validate_series(&bars).map_err(|e| e.to_string())?;
    Ok(bars)
}

impl MarketDataPort for CsvMarketData {
    fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, TurbotraderError> {
        let path = self.csv_path(asset, timeframe);
        let unavailable = |reason: String| TurbotraderError::DataUnavailable {
            asset: asset.to_string(),
            timeframe: timeframe.to_string(),
            reason,
        };
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;
        let bars = parse_series(&content).map_err(|reason| TurbotraderError::InvalidSeries {
            reason: format!("{}: {}", path.display(), reason),
        })?;
        if bars.is_empty() {
            return Err(unavailable(format!("{} has no bars", path.display())));
        }
        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }
}
