//! Tests for CLI error classification.

use super::*;

#[test]
fn test_missing_credentials_is_hard() {
    let err = Error::MissingCredentials("GITHUB_TOKEN".to_string());
    assert!(err.is_hard());
}

#[test]
fn test_auth_failure_is_hard() {
    let err = Error::Client(github_client::Error::AuthError("bad token".to_string()));
    assert!(err.is_hard());
}

#[test]
fn test_validation_failure_is_not_hard() {
    let err = Error::Config(config_model::ConfigError::ValidationFailed {
        error_count: 1,
        errors: vec!["duplicate repository 'widget'".to_string()],
    });
    assert!(!err.is_hard());
}

#[test]
fn test_transport_failure_is_not_hard() {
    let err = Error::Client(github_client::Error::Transport("reset".to_string()));
    assert!(!err.is_hard());
}
