//! Tests for engine error classification.

use super::*;

#[test]
fn test_auth_error_is_fatal() {
    let err = EngineError::Client(github_client::Error::AuthError("bad token".to_string()));
    assert!(err.is_fatal());
}

#[test]
fn test_transport_error_is_not_fatal() {
    let err = EngineError::Client(github_client::Error::Transport("reset".to_string()));
    assert!(!err.is_fatal());
}

#[test]
fn test_cancelled_is_not_fatal() {
    assert!(!EngineError::Cancelled.is_fatal());
}

#[test]
fn test_client_error_renders_transparently() {
    let err = EngineError::Client(github_client::Error::NotFound("/orgs/acme".to_string()));
    assert!(err.to_string().contains("/orgs/acme"));
}
