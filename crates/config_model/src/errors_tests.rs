//! Tests for configuration error rendering.

use super::*;

#[test]
fn test_validation_failed_reports_count() {
    let err = ConfigError::ValidationFailed {
        error_count: 3,
        errors: vec![
            "duplicate repository 'widget'".to_string(),
            "invalid webhook url".to_string(),
            "duplicate secret 'KEY'".to_string(),
        ],
    };
    assert!(err.to_string().contains("3 error(s)"));
}

#[test]
fn test_bypass_actor_error_includes_actor() {
    let err = ConfigError::InvalidBypassActor {
        actor: "@a/b/c".to_string(),
        reason: "expected '@login' or '@org/team-slug'".to_string(),
    };
    let rendered = err.to_string();
    assert!(rendered.contains("@a/b/c"));
    assert!(rendered.contains("team-slug"));
}

#[test]
fn test_credential_errors_render_scheme_and_reference() {
    let unknown = CredentialError::UnknownProvider {
        scheme: "vault".to_string(),
    };
    assert!(unknown.to_string().contains("vault"));

    let failed = CredentialError::LookupFailed {
        reference: "ci/key".to_string(),
        reason: "timeout".to_string(),
    };
    assert!(failed.to_string().contains("ci/key"));
}
