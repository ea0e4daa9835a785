//! Tests for the canonical model types.

use super::*;
use serde_json::json;

#[test]
fn test_unset_scalars_are_omitted_from_serialization() {
    let repo = RepositoryConfig::new("widget");
    let value = serde_json::to_value(&repo).unwrap();
    // Unmanaged fields must not appear, so the diff engine skips them.
    assert!(value.get("description").is_none());
    assert!(value.get("allow_squash_merge").is_none());
    assert_eq!(value["name"], "widget");
}

#[test]
fn test_list_fields_always_serialize() {
    let rule = BranchProtectionRule::new("main");
    let value = serde_json::to_value(&rule).unwrap();
    // An empty actor list means "no actors", not "unmanaged".
    assert_eq!(value["push_restrictions"], json!([]));
    assert_eq!(value["required_status_checks"], json!([]));
}

#[test]
fn test_document_round_trip() {
    let mut org = OrganizationConfig::new("acme");
    org.settings.billing_email = Some("ops@acme.example".to_string());
    org.webhooks.push(WebhookConfig {
        url: "https://ci.example.com/hook".to_string(),
        events: vec!["push".to_string(), "pull_request".to_string()],
        active: Some(true),
        ..WebhookConfig::default()
    });
    let mut repo = RepositoryConfig::new("widget");
    repo.allow_squash_merge = Some(true);
    repo.branch_protection_rules.push(BranchProtectionRule {
        pattern: "main".to_string(),
        required_approving_review_count: Some(2),
        push_restrictions: vec!["@acme/platform".to_string()],
        ..BranchProtectionRule::default()
    });
    org.repositories.push(repo);
    let document = DesiredStateDocument {
        organizations: vec![org],
    };

    let value = serde_json::to_value(&document).unwrap();
    let back: DesiredStateDocument = serde_json::from_value(value).unwrap();
    assert_eq!(document, back);
}

#[test]
fn test_unknown_fields_fail_deserialization() {
    let result = serde_json::from_value::<RepositoryConfig>(json!({
        "name": "widget",
        "allow_sqash_merge": true,
    }));
    assert!(result.is_err());
}

#[test]
fn test_repository_lookup_by_name() {
    let mut org = OrganizationConfig::new("acme");
    org.repositories.push(RepositoryConfig::new("widget"));
    org.repositories.push(RepositoryConfig::new("gadget"));
    assert!(org.repository("widget").is_some());
    assert!(org.repository("missing").is_none());
}

#[test]
fn test_redaction_marker() {
    assert!(is_redacted(REDACTED_VALUE));
    assert!(!is_redacted("hunter2"));
    assert!(!is_redacted(""));
}

#[test]
fn test_defaults_deserialize_from_identity_only() {
    let environment: EnvironmentConfig =
        serde_json::from_value(json!({ "name": "production" })).unwrap();
    assert_eq!(environment.name, "production");
    assert!(environment.reviewers.is_empty());
    assert!(environment.wait_timer.is_none());

    let team: TeamConfig = serde_json::from_value(json!({ "name": "platform" })).unwrap();
    assert!(team.members.is_empty());

    let role: CustomRole = serde_json::from_value(json!({ "name": "releaser" })).unwrap();
    assert!(role.permissions.is_empty());

    let secret: SecretConfig = serde_json::from_value(json!({ "name": "DEPLOY_KEY" })).unwrap();
    assert!(secret.value.is_none());

    let variable: VariableConfig = serde_json::from_value(json!({ "name": "REGION" })).unwrap();
    assert!(variable.value.is_none());

    let ruleset: RulesetConfig = serde_json::from_value(json!({ "name": "baseline" })).unwrap();
    assert!(ruleset.bypass_actors.is_empty());
}
