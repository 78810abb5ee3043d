//! Domain error types.

/// Top-level error type for turbotrader.
#[derive(Debug, thiserror::Error)]
pub enum TurbotraderError {
    #[error("insufficient data for {indicator}: have {bars} bars, need {minimum}")]
    InsufficientData {
        indicator: String,
        bars: usize,
        minimum: usize,
    },

    #[error("insufficient timeframes for {asset}: {usable} usable, need {minimum}")]
    InsufficientTimeframes {
        asset: String,
        usable: usize,
        minimum: usize,
    },

    #[error("market data unavailable for {asset} ({timeframe}): {reason}")]
    DataUnavailable {
        asset: String,
        timeframe: String,
        reason: String,
    },

    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("confirmation for {asset} timed out after {timeout_ms}ms")]
    ConfirmationTimeout { asset: String, timeout_ms: u64 },

    #[error("confirmation failed for {asset}: {reason}")]
    ConfirmationError { asset: String, reason: String },

    #[error("execution failed for {asset}: {reason}")]
    ExecutionError { asset: String, reason: String },

    #[error("weight invariant violated: {reason}")]
    WeightInvariantViolation { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TurbotraderError {
    pub fn insufficient_data(indicator: &str, bars: usize, minimum: usize) -> Self {
        TurbotraderError::InsufficientData {
            indicator: indicator.to_string(),
            bars,
            minimum,
        }
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TurbotraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that skip one asset for the current scan without aborting the cycle.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            TurbotraderError::InsufficientData { .. }
                | TurbotraderError::InsufficientTimeframes { .. }
                | TurbotraderError::DataUnavailable { .. }
                | TurbotraderError::InvalidSeries { .. }
        )
    }
}

impl From<&TurbotraderError> for std::process::ExitCode {
    fn from(err: &TurbotraderError) -> Self {
        let code: u8 = match err {
            TurbotraderError::Io(_) => 1,
            TurbotraderError::ConfigParse { .. }
            | TurbotraderError::ConfigMissing { .. }
            | TurbotraderError::ConfigInvalid { .. } => 2,
            TurbotraderError::Storage { .. }
            | TurbotraderError::DataUnavailable { .. }
            | TurbotraderError::InvalidSeries { .. } => 3,
            TurbotraderError::ExecutionError { .. }
            | TurbotraderError::ConfirmationTimeout { .. }
            | TurbotraderError::ConfirmationError { .. } => 4,
            TurbotraderError::InsufficientData { .. }
            | TurbotraderError::InsufficientTimeframes { .. } => 5,
            TurbotraderError::WeightInvariantViolation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
