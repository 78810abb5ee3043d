//! Market data port trait.

use crate::domain::error::TurbotraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

pub trait MarketDataPort {
    /// Returns up to the last `lookback` bars, oldest first.
    ///
    /// Fails with `DataUnavailable` when the source has nothing for the pair.
    fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, TurbotraderError>;
}
