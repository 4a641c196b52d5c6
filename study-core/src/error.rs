use thiserror::Error;

/// Errors surfaced by the study runtime. Nothing here is retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StudyError {
    #[error("invalid study configuration: {0}")]
    InvalidConfiguration(String),

    #[error("preference {key} is set to '{name}', but no variation with that name exists")]
    UnknownOverrideVariation { key: String, name: String },

    #[error("invalid telemetry payload at '{key}': {reason}")]
    InvalidPayloadShape { key: String, reason: String },

    #[error("study is not configured")]
    NotConfigured,

    #[error("preference store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("telemetry transport failed: {0}")]
    Transport(String),
}

impl StudyError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        StudyError::InvalidConfiguration(msg.into())
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        StudyError::StoreUnavailable(err.to_string())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        StudyError::Transport(err.to_string())
    }
}

pub type StudyResult<T> = Result<T, StudyError>;
