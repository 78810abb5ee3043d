//! Momentum as rate of change over `n` bars.
//!
//! MOMENTUM(n) = (C[t] - C[t-n]) / C[t-n]
//! If C[t-n] == 0: MOMENTUM = 0
//! Needs n + 1 bars.

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_momentum(bars: &[OhlcvBar], lookback: usize) -> Result<f64, TurbotraderError> {
    let lookback = lookback.max(1);
    let minimum = lookback + 1;
    if bars.len() < minimum {
        return Err(TurbotraderError::insufficient_data(
            "momentum",
            bars.len(),
            minimum,
        ));
    }

    let last = bars.len() - 1;
    let prev_close = bars[last - lookback].close;
    if prev_close == 0.0 {
        return Ok(0.0);
    }
    Ok((bars[last].close - prev_close) / prev_close)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn momentum_basic_calculation() {
        let bars = make_bars(&[100.0, 105.0, 110.0, 115.0]);
        let m = calculate_momentum(&bars, 2).unwrap();
        let expected = (115.0 - 105.0) / 105.0;
        assert!((m - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn momentum_negative_change() {
        let bars = make_bars(&[100.0, 90.0, 80.0]);
        let m = calculate_momentum(&bars, 2).unwrap();
        assert!((m - (-0.2)).abs() < 1e-12);
    }

    #[test]
    fn momentum_zero_reference() {
        let bars = make_bars(&[0.0, 100.0, 110.0]);
        assert_eq!(calculate_momentum(&bars, 2).unwrap(), 0.0);
    }

    #[test]
    fn momentum_needs_lookback_plus_one() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let err = calculate_momentum(&bars, 3).unwrap_err();
        assert!(matches!(
            err,
            TurbotraderError::InsufficientData { bars: 3, minimum: 4, .. }
        ));
        assert!(calculate_momentum(&bars, 2).is_ok());
    }

    #[test]
    fn momentum_uses_latest_bar_only() {
        let bars = make_bars(&[50.0, 100.0, 105.0, 110.0]);
        let m = calculate_momentum(&bars, 1).unwrap();
        assert!((m - (110.0 - 105.0) / 105.0).abs() < 1e-12);
    }
}
