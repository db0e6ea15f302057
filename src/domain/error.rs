//! Domain error types.

/// Top-level error type for siftrader.
///
/// Only configuration problems (and I/O while loading data files) abort a
/// screening cycle. Per-instrument failures are reported as structured
/// outcomes by the funnel and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SiftraderError {
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

    #[error("data error in {path}: {reason}")]
    Data { path: String, reason: String },

    #[error("no history for {symbol}")]
    NoHistory { symbol: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("no position for {symbol}")]
    UnknownPosition { symbol: String },

    #[error("position for {symbol} is already {state}")]
    PositionNotOpen { symbol: String, state: String },

    #[error("cycle cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SiftraderError> for std::process::ExitCode {
    fn from(err: &SiftraderError) -> Self {
        let code: u8 = match err {
            SiftraderError::Io(_) => 1,
            SiftraderError::ConfigParse { .. }
            | SiftraderError::ConfigMissing { .. }
            | SiftraderError::ConfigInvalid { .. } => 2,
            SiftraderError::Data { .. } => 3,
            SiftraderError::NoHistory { .. } | SiftraderError::InsufficientHistory { .. } => 4,
            SiftraderError::UnknownPosition { .. } | SiftraderError::PositionNotOpen { .. } => 5,
            SiftraderError::Cancelled => 6,
        };
        std::process::ExitCode::from(code)
    }
}
