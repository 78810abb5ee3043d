//! Scoring timeframes, from 1-minute to 1-week candles.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
}

impl Timeframe {
    /// All timeframes, shortest first.
    pub const ALL: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// Exchange kline interval string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
    }

    pub const fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H2 => 7_200,
            Timeframe::H4 => 14_400,
            Timeframe::H6 => 21_600,
            Timeframe::H8 => 28_800,
            Timeframe::H12 => 43_200,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    /// Number of `base` bars per bar of `self`, when `self` is an exact multiple of `base`.
    pub fn multiple_of(&self, base: Timeframe) -> Option<usize> {
        let (target, base) = (self.duration_secs(), base.duration_secs());
        if target < base || target % base != 0 {
            return None;
        }
        Some((target / base) as usize)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a comma-separated timeframe list such as `1m,5m,1h`.
pub fn parse_timeframes(input: &str) -> Result<Vec<Timeframe>, String> {
    let mut timeframes = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let tf = Timeframe::parse(token).ok_or_else(|| format!("unknown timeframe '{token}'"))?;
        if timeframes.contains(&tf) {
            return Err(format!("duplicate timeframe '{token}'"));
        }
        timeframes.push(tf);
    }
    if timeframes.is_empty() {
        return Err("no timeframes given".to_string());
    }
    timeframes.sort();
    Ok(timeframes)
}
