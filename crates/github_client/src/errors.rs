//! Error types for GitHub client operations.
//!
//! This module defines the error types that can occur when talking to GitHub
//! through any of the three channels (REST, GraphQL, web UI). The taxonomy
//! distinguishes fatal authentication problems from retryable transport
//! failures and from soft per-field web scraping failures, because callers
//! treat each class differently.

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur during GitHub client operations.
///
/// Authentication errors are fatal for a run. Rate-limit and transport
/// errors are retryable up to the configured cap, after which they surface
/// as [`Error::RetriesExhausted`]. Web selector errors are soft: the caller
/// is expected to skip the affected field and continue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A generic API request failure.
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Authentication or GitHub client initialization failure.
    ///
    /// This error occurs when:
    /// - The API token is invalid or expired
    /// - Web UI credentials (username/password/TOTP) are rejected
    /// - The underlying client cannot be built
    ///
    /// The contained string provides specific details about the failure.
    #[error("Failed to authenticate or initialize GitHub client: {0}")]
    AuthError(String),

    /// Error deserializing a response from GitHub.
    #[error("Failed to deserialize GitHub response: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The GitHub API returned a response in an unexpected format.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// GitHub signalled a primary or secondary rate limit.
    ///
    /// Carries the reset hint in seconds when GitHub provided one; callers
    /// should sleep at least that long before retrying.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Seconds until the limit resets, if GitHub told us.
        reset_in_secs: Option<u64>,
    },

    /// A retryable call failed even after exhausting the retry budget.
    ///
    /// The executor surfaces this per plan entry instead of aborting the
    /// whole run.
    #[error("{message} (gave up after {attempts} attempt(s))")]
    RetriesExhausted { attempts: u32, message: String },

    /// A network-level transport failure (connection reset, timeout).
    ///
    /// Transport failures are retryable.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The web channel could not find the expected element on a page.
    ///
    /// GitHub's UI markup is outside this system's control, so this is a
    /// soft error: the specific field is skipped with a warning rather than
    /// aborting the run.
    #[error("Web UI element not found: {selector}")]
    SelectorNotFound { selector: String },

    /// The web channel located the element but could not read or submit the
    /// owning form.
    #[error("Web UI form interaction failed: {0}")]
    WebFormError(String),
}

impl Error {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::Transport(_))
    }

    /// Whether the error is scoped to a single web-sourced field.
    ///
    /// Soft errors must never abort a run; the affected field is skipped.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Error::SelectorNotFound { .. } | Error::WebFormError(_)
        )
    }
}
