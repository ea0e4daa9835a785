//! Configuration model error types.
//!
//! Domain-specific errors for desired-state document loading, schema
//! validation, and secret-reference resolution.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Configuration model errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Configuration document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("Failed to parse configuration document: {reason}")]
    ParseError { reason: String },

    #[error("Invalid bypass actor '{actor}': {reason}")]
    InvalidBypassActor { actor: String, reason: String },

    #[error("Invalid secret reference '{reference}': {reason}")]
    InvalidSecretReference { reference: String, reason: String },

    #[error("Schema generation failed: {reason}")]
    SchemaGeneration { reason: String },

    #[error("Configuration validation failed with {error_count} error(s)")]
    ValidationFailed {
        error_count: usize,
        errors: Vec<String>,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while resolving a secret reference through a credential
/// provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("No credential provider registered for scheme '{scheme}'")]
    UnknownProvider { scheme: String },

    #[error("Credential lookup for '{reference}' failed: {reason}")]
    LookupFailed { reference: String, reason: String },
}
