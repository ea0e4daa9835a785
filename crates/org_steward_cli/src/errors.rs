//! CLI error types.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors surfaced by the command-line front end.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read configuration file '{path}': {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("Failed to write configuration file '{path}': {reason}")]
    ConfigWrite { path: String, reason: String },

    #[error("Configuration file '{path}' is not valid JSON: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Organization '{0}' is not present in the configuration document")]
    UnknownOrganization(String),

    #[error(transparent)]
    Engine(#[from] org_steward_core::EngineError),

    #[error(transparent)]
    Client(#[from] github_client::Error),

    #[error(transparent)]
    Config(#[from] config_model::ConfigError),

    #[error("Failed to read from stdin")]
    StdinReadFailed,
}

impl Error {
    /// Whether the failure is a hard one (exit code 2): unusable
    /// credentials or an unreadable document, as opposed to per-entity
    /// failures.
    pub fn is_hard(&self) -> bool {
        match self {
            Error::MissingCredentials(_)
            | Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::ConfigWrite { .. }
            | Error::UnknownOrganization(_)
            | Error::StdinReadFailed => true,
            Error::Engine(engine) => engine.is_fatal(),
            Error::Client(client) => matches!(client, github_client::Error::AuthError(_)),
            Error::Config(_) => false,
        }
    }
}
