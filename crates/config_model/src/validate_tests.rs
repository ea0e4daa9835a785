//! Tests for document validation.

use super::*;
use serde_json::json;

fn validator() -> DocumentValidator {
    DocumentValidator::new().expect("schema must compile")
}

fn minimal_document() -> serde_json::Value {
    json!({
        "organizations": [
            {
                "github_id": "acme",
                "settings": { "billing_email": "ops@acme.example" },
            }
        ]
    })
}

#[test]
fn test_minimal_document_is_valid() {
    let report = validator().validate(&minimal_document());
    assert!(report.is_valid(), "issues: {:?}", report.issues());
}

#[test]
fn test_undeclared_field_is_rejected() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "settings": { "billing_emial": "typo@acme.example" },
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(!report.is_valid());
    assert!(report.error_count() >= 1);
}

#[test]
fn test_wrong_type_is_rejected_with_path() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "settings": { "web_commit_signoff_required": "yes" },
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(!report.is_valid());
    let has_path = report.issues().iter().any(|issue| {
        issue.field_path.contains("web_commit_signoff_required")
    });
    assert!(has_path, "issues: {:?}", report.issues());
}

#[test]
fn test_violations_are_collected_not_fail_fast() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "settings": {
                    "web_commit_signoff_required": "yes",
                    "two_factor_requirement": 17,
                },
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(report.error_count() >= 2, "issues: {:?}", report.issues());
}

#[test]
fn test_duplicate_repository_names() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "repositories": [
                    { "name": "widget" },
                    { "name": "widget" },
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(!report.is_valid());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("duplicate repository 'widget'")));
}

#[test]
fn test_invalid_bypass_actor_reported_with_path() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "repositories": [
                    {
                        "name": "widget",
                        "branch_protection_rules": [
                            {
                                "pattern": "main",
                                "push_restrictions": ["@a/b/c"],
                            }
                        ],
                    }
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(!report.is_valid());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.field_path.contains("push_restrictions")));
}

#[test]
fn test_http_webhook_is_a_warning_only() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "webhooks": [
                    { "url": "http://ci.example.com/hook" }
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(report.is_valid());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.severity == ValidationSeverity::Warning));
}

#[test]
fn test_non_http_webhook_scheme_is_an_error() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "webhooks": [
                    { "url": "ftp://ci.example.com/hook" }
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(!report.is_valid());
}

#[test]
fn test_invalid_secret_names() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "secrets": [
                    { "name": "1BAD" },
                    { "name": "GITHUB_TOKEN" },
                    { "name": "has-dashes" },
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert_eq!(report.error_count(), 3, "issues: {:?}", report.issues());
}

#[test]
fn test_selected_visibility_without_repositories_warns() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "secrets": [
                    { "name": "DEPLOY_KEY", "visibility": "selected" }
                ],
            }
        ]
    });
    let report = validator().validate(&document);
    assert!(report.is_valid());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.severity == ValidationSeverity::Warning));
}

#[test]
fn test_parse_returns_collected_errors() {
    let document = json!({
        "organizations": [
            {
                "github_id": "acme",
                "repositories": [
                    { "name": "widget" },
                    { "name": "widget" },
                ],
            }
        ]
    });
    let result = validator().parse(&document);
    match result {
        Err(ConfigError::ValidationFailed { error_count, errors }) => {
            assert_eq!(error_count, errors.len());
            assert!(error_count >= 1);
        }
        other => panic!("Expected ValidationFailed, got: {other:?}"),
    }
}

#[test]
fn test_parse_returns_typed_document() {
    let document = validator().parse(&minimal_document()).unwrap();
    assert_eq!(document.organizations.len(), 1);
    assert_eq!(document.organizations[0].github_id, "acme");
    assert_eq!(
        document.organizations[0].settings.billing_email.as_deref(),
        Some("ops@acme.example")
    );
}
