//! Error types for the reconciliation engine.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors raised while fetching live state, diffing, or applying a plan.
///
/// Channel errors keep their own taxonomy (retryable, soft, fatal); the
/// engine adds the run-level conditions.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A GitHub channel call failed.
    #[error(transparent)]
    Client(#[from] github_client::Error),

    /// The desired-state document or model is invalid.
    #[error(transparent)]
    Config(#[from] config_model::ConfigError),

    /// A secret reference could not be resolved.
    #[error(transparent)]
    Credential(#[from] config_model::CredentialError),

    /// GitHub returned a payload the engine cannot interpret.
    #[error("Unexpected API payload: {0}")]
    Payload(String),

    /// The run was cancelled between plan entries.
    #[error("Run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether the whole run must stop (credentials are unusable).
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Client(github_client::Error::AuthError(_)))
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
