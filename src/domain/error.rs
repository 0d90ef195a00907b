//! Domain error types.

/// Top-level error type for trendfolio.
#[derive(Debug, thiserror::Error)]
pub enum TrendfolioError {
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

    #[error("no price history for {code}")]
    NoData { code: String },

    #[error("malformed price history: {reason}")]
    DataFormat { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrendfolioError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TrendfolioError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TrendfolioError> for std::process::ExitCode {
    fn from(err: &TrendfolioError) -> Self {
        let code: u8 = match err {
            TrendfolioError::Io(_) => 1,
            TrendfolioError::ConfigParse { .. }
            | TrendfolioError::ConfigMissing { .. }
            | TrendfolioError::ConfigInvalid { .. } => 2,
            TrendfolioError::DataFormat { .. } => 3,
            TrendfolioError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
