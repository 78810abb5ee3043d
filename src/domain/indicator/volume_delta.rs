//! Volume delta: latest volume relative to its trailing average.
//!
//! VOLUME_DELTA(n) = V[t] / mean(V[t-n..t-1]) - 1
//! If the trailing mean is 0: VOLUME_DELTA = 0
//! Needs n + 1 bars.

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_volume_delta(
    bars: &[OhlcvBar],
    lookback: usize,
) -> Result<f64, TurbotraderError> {
    let lookback = lookback.max(1);
    let minimum = lookback + 1;
    if bars.len() < minimum {
        return Err(TurbotraderError::insufficient_data(
            "volume_delta",
            bars.len(),
            minimum,
        ));
    }

    let last = bars.len() - 1;
    let trailing = &bars[last - lookback..last];
    let average = trailing.iter().map(|b| b.volume).sum::<f64>() / lookback as f64;
    if average == 0.0 {
        return Ok(0.0);
    }
    Ok(bars[last].volume / average - 1.0)
}
