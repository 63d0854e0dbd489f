//! Domain error types.
//!
//! Only fatal conditions live here. Indicator warmup and rejected sizing are
//! ordinary states of the run and are modelled with `Option` and
//! [`SizingOutcome`](crate::domain::sizing::SizingOutcome) instead.

/// Top-level error type for medianband.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("data integrity error in series '{series}' ({check}): {detail}")]
    DataIntegrity {
        series: String,
        check: &'static str,
        detail: String,
    },

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

    #[error("failed to load {source_name}: {reason}")]
    DataLoad { source_name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn integrity(series: &str, check: &'static str, detail: impl Into<String>) -> Self {
        EngineError::DataIntegrity {
            series: series.to_string(),
            check,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::DataLoad { .. } => 3,
            EngineError::DataIntegrity { .. } => 5,
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
