//! Resampling a base-interval series into a coarser timeframe.
//!
//! Buckets are aligned to the epoch: a bar belongs to the bucket starting at
//! `floor(ts / duration) * duration`. The last bucket may be partial, which is
//! what a live exchange reports for the still-forming candle.

use chrono::{DateTime, NaiveDateTime};

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

fn bucket_start(ts: &NaiveDateTime, duration_secs: i64) -> Option<NaiveDateTime> {
    let secs = ts.and_utc().timestamp();
    let start = secs.div_euclid(duration_secs) * duration_secs;
    DateTime::from_timestamp(start, 0).map(|dt| dt.naive_utc())
}

/// Returns `None` when `target` is not a whole multiple of `base`.
pub fn resample(bars: &[OhlcvBar], base: Timeframe, target: Timeframe) -> Option<Vec<OhlcvBar>> {
    target.multiple_of(base)?;
    if target == base {
        return Some(bars.to_vec());
    }
    let duration = target.duration_secs();

    let mut out: Vec<OhlcvBar> = Vec::with_capacity(bars.len() / 2 + 1);
    for bar in bars {
        let start = bucket_start(&bar.timestamp, duration)?;
        match out.last_mut() {
            Some(current) if current.timestamp == start => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume += bar.volume;
            }
            _ => out.push(OhlcvBar {
                timestamp: start,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            }),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::parse_timestamp;

    fn bar(ts: &str, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: parse_timestamp(ts).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn hourly_to_four_hour() {
        let bars = vec![
            bar("2024-01-01 00:00:00", 10.0, 12.0, 9.0, 11.0, 100.0),
            bar("2024-01-01 01:00:00", 11.0, 15.0, 10.0, 14.0, 200.0),
            bar("2024-01-01 02:00:00", 14.0, 14.5, 8.0, 9.0, 50.0),
            bar("2024-01-01 03:00:00", 9.0, 10.0, 8.5, 9.5, 25.0),
            bar("2024-01-01 04:00:00", 9.5, 11.0, 9.0, 10.5, 10.0),
        ];
        let out = resample(&bars, Timeframe::H1, Timeframe::H4).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, parse_timestamp("2024-01-01 00:00:00").unwrap());
        assert_eq!(out[0].open, 10.0);
        assert_eq!(out[0].high, 15.0);
        assert_eq!(out[0].low, 8.0);
        assert_eq!(out[0].close, 9.5);
        assert_eq!(out[0].volume, 375.0);
        // partial trailing bucket
        assert_eq!(out[1].timestamp, parse_timestamp("2024-01-01 04:00:00").unwrap());
        assert_eq!(out[1].close, 10.5);
    }

    #[test]
    fn buckets_align_to_epoch_not_first_bar() {
        let bars = vec![
            bar("2024-01-01 03:00:00", 1.0, 1.0, 1.0, 1.0, 1.0),
            bar("2024-01-01 04:00:00", 2.0, 2.0, 2.0, 2.0, 1.0),
        ];
        let out = resample(&bars, Timeframe::H1, Timeframe::H4).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, parse_timestamp("2024-01-01 00:00:00").unwrap());
    }

    #[test]
    fn same_timeframe_is_identity() {
        let bars = vec![bar("2024-01-01 00:00:00", 1.0, 2.0, 0.5, 1.5, 10.0)];
        assert_eq!(resample(&bars, Timeframe::H1, Timeframe::H1).unwrap(), bars);
    }

    #[test]
    fn finer_or_incompatible_target_is_none() {
        assert!(resample(&[], Timeframe::H1, Timeframe::M30).is_none());
        assert!(resample(&[], Timeframe::H8, Timeframe::H12).is_none());
    }

    #[test]
    fn daily_from_hourly() {
        let bars: Vec<OhlcvBar> = (0..48)
            .map(|h| OhlcvBar {
                timestamp: parse_timestamp("2024-01-01 00:00:00").unwrap()
                    + chrono::Duration::hours(h),
                open: h as f64,
                high: h as f64,
                low: h as f64,
                close: h as f64,
                volume: 1.0,
            })
            .collect();
        let out = resample(&bars, Timeframe::H1, Timeframe::D1).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].open, 24.0);
        assert_eq!(out[1].close, 47.0);
        assert_eq!(out[1].volume, 24.0);
    }
}
