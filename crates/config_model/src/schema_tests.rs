//! Tests for the field schema tables.

use super::*;
use serde_json::json;

#[test]
fn test_every_kind_has_a_schema() {
    for kind in [
        ResourceKind::Organization,
        ResourceKind::Repository,
        ResourceKind::BranchProtectionRule,
        ResourceKind::Ruleset,
        ResourceKind::Webhook,
        ResourceKind::Secret,
        ResourceKind::Variable,
        ResourceKind::Environment,
        ResourceKind::Team,
        ResourceKind::Role,
    ] {
        let schema = schema_for(kind);
        assert_eq!(schema.kind, kind);
        assert!(!schema.fields.is_empty());
        assert!(!schema.identity_field.is_empty());
    }
}

#[test]
fn test_field_names_are_unique_within_each_schema() {
    for kind in [
        ResourceKind::Organization,
        ResourceKind::Repository,
        ResourceKind::BranchProtectionRule,
        ResourceKind::Ruleset,
        ResourceKind::Webhook,
        ResourceKind::Secret,
        ResourceKind::Variable,
        ResourceKind::Environment,
        ResourceKind::Team,
        ResourceKind::Role,
    ] {
        let schema = schema_for(kind);
        let mut names: Vec<&str> = schema.fields.iter().map(|f| f.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len(), "duplicate field in {kind:?}");
    }
}

#[test]
fn test_organization_schema_tags_web_fields() {
    let schema = schema_for(ResourceKind::Organization);
    assert_eq!(
        schema.field("two_factor_requirement").unwrap().provider,
        ProviderTag::Web
    );
    assert_eq!(
        schema.field("billing_email").unwrap().provider,
        ProviderTag::Rest
    );
    assert_eq!(
        schema
            .field("web_commit_signoff_required")
            .unwrap()
            .provider,
        ProviderTag::Rest
    );
}

#[test]
fn test_diffable_fields_excludes_web_when_disabled() {
    let schema = schema_for(ResourceKind::Organization);
    let all: Vec<&str> = schema.diffable_fields(true).map(|f| f.name).collect();
    let rest_only: Vec<&str> = schema.diffable_fields(false).map(|f| f.name).collect();

    assert!(all.contains(&"two_factor_requirement"));
    assert!(!rest_only.contains(&"two_factor_requirement"));
    assert!(rest_only.contains(&"billing_email"));
    assert!(rest_only.len() < all.len());
}

#[test]
fn test_secret_fields_are_marked() {
    assert!(schema_for(ResourceKind::Secret).field("value").unwrap().secret);
    assert!(schema_for(ResourceKind::Webhook).field("secret").unwrap().secret);
    assert!(!schema_for(ResourceKind::Variable).field("value").unwrap().secret);
}

#[test]
fn test_forced_update_fields_are_marked() {
    assert!(schema_for(ResourceKind::Webhook).field("url").unwrap().forces_recreate);
    assert!(schema_for(ResourceKind::Ruleset).field("target").unwrap().forces_recreate);
    assert!(!schema_for(ResourceKind::Webhook).field("active").unwrap().forces_recreate);
}

#[test]
fn test_identity_keys_include_aliases() {
    let schema = schema_for(ResourceKind::Webhook);
    let hook = json!({
        "url": "https://ci.example.com/hook",
        "aliases": ["https://old-ci.example.com/hook"],
    });
    assert_eq!(
        schema.identity_keys(&hook),
        vec![
            "https://ci.example.com/hook".to_string(),
            "https://old-ci.example.com/hook".to_string(),
        ]
    );
    assert_eq!(
        schema.identity_of(&hook).as_deref(),
        Some("https://ci.example.com/hook")
    );
}

#[test]
fn test_project_prunes_unmanaged_fields() {
    let schema = schema_for(ResourceKind::Repository);
    let raw = json!({
        "name": "widget",
        "description": "A widget",
        "allow_squash_merge": true,
        "stargazers_count": 420,
        "owner": { "login": "acme" },
        "homepage": null,
    });
    let projected = schema.project(&raw);
    assert_eq!(projected["name"], "widget");
    assert_eq!(projected["allow_squash_merge"], true);
    assert!(projected.get("stargazers_count").is_none());
    assert!(projected.get("owner").is_none());
    // Nulls are dropped so they read as unmanaged.
    assert!(projected.get("homepage").is_none());
}
