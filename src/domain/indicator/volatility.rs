//! Volatility as the population standard deviation of simple returns.
//!
//! r[j] = C[j] / C[j-1] - 1 over the last n returns
//! VOLATILITY(n) = sqrt(sum((r - mean(r))^2) / n) * sqrt(annualization)
//! Needs n + 1 bars.

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_volatility(
    bars: &[OhlcvBar],
    period: usize,
    annualization: f64,
) -> Result<f64, TurbotraderError> {
    let period = period.max(1);
    let minimum = period + 1;
    if bars.len() < minimum {
        return Err(TurbotraderError::insufficient_data(
            "volatility",
            bars.len(),
            minimum,
        ));
    }

    let window = &bars[bars.len() - minimum..];
    let returns: Vec<f64> = window
        .windows(2)
        .map(|w| {
            if w[0].close == 0.0 {
                0.0
            } else {
                w[1].close / w[0].close - 1.0
            }
        })
        .collect();

    let mean = returns.iter().sum::<f64>() / period as f64;
    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    Ok(variance.sqrt() * annualization.max(0.0).sqrt())
}
