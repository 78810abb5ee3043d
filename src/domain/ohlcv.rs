//! OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::error::TurbotraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Rejects series whose timestamps are not strictly increasing.
pub fn validate_series(bars: &[OhlcvBar]) -> Result<(), TurbotraderError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(TurbotraderError::InvalidSeries {
                reason: format!(
                    "bar {} at {} does not follow {}",
                    i + 1,
                    pair[1].timestamp,
                    pair[0].timestamp
                ),
            });
        }
    }
    Ok(())
}

/// Accepts `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S` or a bare `%Y-%m-%d` (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
