//! Error enums for failures that are *not* per-target provider outcomes.
//!
//! Provider failures (auth, rate limits, timeouts, …) are values inside a
//! [`CanonicalResult`](crate::types::CanonicalResult). Only input validation
//! and engine bugs surface as `Err`.

use thiserror::Error;

use crate::types::ErrorCode;

/// Bad input caught before anything is sent to a provider.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unsupported provider: {0}")]
    UnknownProvider(String),

    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    #[error("maxTokens must be positive")]
    NonPositiveMaxTokens,

    #[error("model '{model}' is not supported by provider {provider}")]
    UnsupportedModel { provider: String, model: String },

    #[error("provider {0} is disabled")]
    ProviderDisabled(String),

    #[error("comparison requires at least one provider target")]
    EmptyBatch,

    #[error("maximum {max} configurations allowed for comparison, got {got}")]
    TooManyTargets { max: usize, got: usize },

    #[error("duplicate comparison target: {0}")]
    DuplicateTarget(String),
}

/// Errors that abort a whole engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected synchronously before dispatch.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Engine logic bug. The only class allowed to abort a batch.
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The taxonomy code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::Validation,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}
