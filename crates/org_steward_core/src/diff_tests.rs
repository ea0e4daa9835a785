//! Tests for the diff engine.

use super::*;
use config_model::{
    BranchProtectionRule, EnvironmentConfig, SecretConfig, VariableConfig, WebhookConfig,
};

fn sample_org() -> OrganizationConfig {
    let mut org = OrganizationConfig::new("acme");
    org.settings.billing_email = Some("ops@acme.example".to_string());
    org.settings.web_commit_signoff_required = Some(false);
    org.settings.two_factor_requirement = Some(true);

    org.webhooks.push(WebhookConfig {
        url: "https://ci.example.com/hook".to_string(),
        events: vec!["push".to_string(), "pull_request".to_string()],
        active: Some(true),
        content_type: Some("json".to_string()),
        ..WebhookConfig::default()
    });
    org.secrets.push(SecretConfig {
        name: "DEPLOY_KEY".to_string(),
        value: Some("plain:hunter2".to_string()),
        visibility: Some("all".to_string()),
        ..SecretConfig::default()
    });
    org.variables.push(VariableConfig {
        name: "REGION".to_string(),
        value: Some("eu-west-1".to_string()),
        ..VariableConfig::default()
    });

    let mut repo = RepositoryConfig::new("widget");
    repo.allow_squash_merge = Some(false);
    repo.description = Some("A widget".to_string());
    repo.branch_protection_rules.push(BranchProtectionRule {
        pattern: "main".to_string(),
        required_approving_review_count: Some(2),
        requires_approving_reviews: Some(true),
        push_restrictions: vec!["@acme/platform".to_string(), "@octocat".to_string()],
        ..BranchProtectionRule::default()
    });
    repo.environments.push(EnvironmentConfig {
        name: "production".to_string(),
        wait_timer: Some(30),
        reviewers: vec!["@acme/release".to_string()],
        ..EnvironmentConfig::default()
    });
    org.repositories.push(repo);
    org
}

fn engine() -> DiffEngine {
    DiffEngine::new(DiffOptions::default())
}

/// Live state the way the fetcher would build it: secrets redacted.
fn as_live(mut org: OrganizationConfig) -> OrganizationConfig {
    for secret in &mut org.secrets {
        secret.value = Some(REDACTED_VALUE.to_string());
    }
    for repo in &mut org.repositories {
        for secret in &mut repo.secrets {
            secret.value = Some(REDACTED_VALUE.to_string());
        }
    }
    org
}

#[test]
fn test_identical_models_produce_empty_plan() {
    let desired = sample_org();
    let live = as_live(sample_org());
    let plan = engine().diff(&live, &desired);
    assert!(plan.is_empty(), "plan: {}", plan.render());
}

#[test]
fn test_scalar_update_is_isolated() {
    // Desired flips allow_squash_merge; live has no branch protection
    // drift, so the plan holds exactly one update entry.
    let mut desired = sample_org();
    desired.repositories[0].allow_squash_merge = Some(true);
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let summary = plan.summary();
    assert_eq!(summary.updates, 1);
    assert_eq!(summary.creates, 0);
    assert_eq!(summary.deletes + summary.suppressed_deletes, 0);

    let repo_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository && c.action == ChangeAction::Update)
        .expect("repository update");
    assert_eq!(repo_change.deltas.len(), 1);
    assert_eq!(repo_change.deltas[0].field, "allow_squash_merge");
    assert_eq!(repo_change.deltas[0].from, json!(false));
    assert_eq!(repo_change.deltas[0].to, json!(true));
    assert!(repo_change.children.iter().all(|c| c.is_noop_tree()));
}

#[test]
fn test_reordering_lists_produces_no_diff() {
    let mut desired = sample_org();
    // Reorder a list-valued scalar field...
    desired.webhooks[0].events.reverse();
    // ...and an actor list inside a nested entity.
    desired.repositories[0].branch_protection_rules[0]
        .push_restrictions
        .reverse();
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    assert!(plan.is_empty(), "plan: {}", plan.render());
}

#[test]
fn test_renaming_identity_without_alias_is_delete_plus_create() {
    let mut desired = sample_org();
    desired.webhooks[0].url = "https://ci-new.example.com/hook".to_string();
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let summary = plan.summary();
    assert_eq!(summary.creates, 1);
    assert_eq!(summary.suppressed_deletes, 1);
    assert_eq!(summary.updates, 0);
}

#[test]
fn test_alias_match_turns_rename_into_update() {
    let mut desired = sample_org();
    desired.repositories[0].name = "widget-core".to_string();
    desired.repositories[0].aliases = vec!["widget".to_string()];
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let repo_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository)
        .expect("repository change");
    assert_eq!(repo_change.action, ChangeAction::Update);
    assert_eq!(repo_change.identity, "widget-core");
    assert_eq!(repo_change.live_identity.as_deref(), Some("widget"));
    assert_eq!(repo_change.deltas[0].field, "name");
}

#[test]
fn test_alias_match_on_recreate_field_forces_update() {
    // Webhook URLs are flagged forces_recreate: moving the endpoint via an
    // alias yields a forced update, not an in-place one.
    let mut desired = sample_org();
    desired.webhooks[0].url = "https://ci-new.example.com/hook".to_string();
    desired.webhooks[0].aliases = vec!["https://ci.example.com/hook".to_string()];
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let hook_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Webhook)
        .expect("webhook change");
    assert_eq!(hook_change.action, ChangeAction::ForcedUpdate);
    assert_eq!(
        hook_change.live_identity.as_deref(),
        Some("https://ci.example.com/hook")
    );
}

#[test]
fn test_secret_masking_suppresses_diff() {
    // Live secret is redacted; desired carries plaintext. No diff.
    let desired = sample_org();
    let live = as_live(sample_org());
    let plan = engine().diff(&live, &desired);
    assert!(plan.is_empty());
}

#[test]
fn test_update_secrets_forces_secret_update() {
    let desired = sample_org();
    let live = as_live(sample_org());
    let options = DiffOptions {
        update_secrets: true,
        ..DiffOptions::default()
    };
    let plan = DiffEngine::new(options).diff(&live, &desired);

    let secret_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Secret)
        .expect("secret change");
    assert_eq!(secret_change.action, ChangeAction::Update);
    // Secret material never reaches the plan.
    assert_eq!(secret_change.deltas[0].to, json!(REDACTED_VALUE));
}

#[test]
fn test_update_webhooks_forces_webhook_secret_update() {
    let mut desired = sample_org();
    desired.webhooks[0].secret = Some("plain:hook-secret".to_string());
    let mut live = as_live(sample_org());
    live.webhooks[0].secret = Some(REDACTED_VALUE.to_string());

    // Without the flag: masked.
    let plan = engine().diff(&live, &desired);
    assert!(plan.is_empty(), "plan: {}", plan.render());

    // With the flag: forced update.
    let options = DiffOptions {
        update_webhooks: true,
        ..DiffOptions::default()
    };
    let plan = DiffEngine::new(options).diff(&live, &desired);
    let hook_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Webhook)
        .expect("webhook change");
    assert_eq!(hook_change.action, ChangeAction::Update);
}

#[test]
fn test_adding_a_secret_is_a_structural_change() {
    let mut desired = sample_org();
    desired.webhooks[0].secret = Some("plain:hook-secret".to_string());
    let live = as_live(sample_org()); // live webhook has no secret

    let plan = engine().diff(&live, &desired);
    let hook_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Webhook)
        .expect("webhook change");
    assert_eq!(hook_change.action, ChangeAction::Update);
    assert_eq!(hook_change.deltas[0].from, Value::Null);
}

#[test]
fn test_deletions_are_suppressed_by_default() {
    let mut desired = sample_org();
    desired.webhooks.clear();
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let delete = plan
        .changes
        .iter()
        .find(|c| c.action == ChangeAction::Delete)
        .expect("delete entry");
    assert!(!delete.actionable);
    assert!(plan.has_suppressed_deletes());
    // Still visible in the plan: drift must be reported.
    assert!(!plan.is_empty());
}

#[test]
fn test_deletions_enabled_become_actionable() {
    let mut desired = sample_org();
    desired.webhooks.clear();
    let live = as_live(sample_org());

    let options = DiffOptions {
        delete_resources: true,
        ..DiffOptions::default()
    };
    let plan = DiffEngine::new(options).diff(&live, &desired);
    let delete = plan
        .changes
        .iter()
        .find(|c| c.action == ChangeAction::Delete)
        .expect("delete entry");
    assert!(delete.actionable);
    assert_eq!(plan.summary().deletes, 1);
}

#[test]
fn test_web_fields_excluded_without_web_channel() {
    let mut desired = sample_org();
    desired.settings.two_factor_requirement = Some(false); // differs from live
    let live = as_live(sample_org());

    let options = DiffOptions {
        include_web_fields: false,
        ..DiffOptions::default()
    };
    let plan = DiffEngine::new(options).diff(&live, &desired);
    assert!(plan.is_empty(), "plan: {}", plan.render());

    // With the web channel the same difference is visible.
    let plan = engine().diff(&live, &desired);
    assert_eq!(plan.summary().updates, 1);
}

#[test]
fn test_unspecified_desired_fields_are_unmanaged() {
    let mut desired = sample_org();
    desired.repositories[0].description = None;
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    assert!(plan.is_empty(), "plan: {}", plan.render());
}

#[test]
fn test_new_repository_creates_children_too() {
    let mut desired = sample_org();
    let mut repo = RepositoryConfig::new("gadget");
    repo.branch_protection_rules
        .push(BranchProtectionRule::new("main"));
    desired.repositories.push(repo);
    let live = as_live(sample_org());

    let plan = engine().diff(&live, &desired);
    let create = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository && c.action == ChangeAction::Create)
        .expect("repository create");
    assert_eq!(create.identity, "gadget");
    assert_eq!(create.children.len(), 1);
    assert_eq!(create.children[0].action, ChangeAction::Create);
    assert_eq!(create.children[0].kind, ResourceKind::BranchProtectionRule);
}

#[test]
fn test_forced_update_on_ruleset_target_change() {
    let mut desired = sample_org();
    desired.rulesets.push(config_model::RulesetConfig {
        name: "baseline".to_string(),
        target: Some("tag".to_string()),
        ..config_model::RulesetConfig::default()
    });
    let mut live = as_live(sample_org());
    live.rulesets.push(config_model::RulesetConfig {
        name: "baseline".to_string(),
        target: Some("branch".to_string()),
        ..config_model::RulesetConfig::default()
    });

    let plan = engine().diff(&live, &desired);
    let ruleset_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Ruleset)
        .expect("ruleset change");
    assert_eq!(ruleset_change.action, ChangeAction::ForcedUpdate);
}

#[test]
fn test_signoff_cascade_derives_repository_updates() {
    let mut desired = sample_org();
    desired.settings.web_commit_signoff_required = Some(true);
    // The repository does not override the field explicitly.
    desired.repositories[0].web_commit_signoff_required = None;
    let mut live = as_live(sample_org());
    live.repositories[0].web_commit_signoff_required = Some(false);

    let plan = engine().diff(&live, &desired);
    let repo_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository)
        .expect("repository change");
    assert_eq!(repo_change.action, ChangeAction::Update);
    let delta = repo_change
        .deltas
        .iter()
        .find(|d| d.field == "web_commit_signoff_required")
        .expect("derived delta");
    assert_eq!(delta.from, json!(false));
    assert_eq!(delta.to, json!(true));
}

#[test]
fn test_signoff_cascade_respects_explicit_override() {
    let mut desired = sample_org();
    desired.settings.web_commit_signoff_required = Some(true);
    desired.repositories[0].web_commit_signoff_required = Some(false); // explicit
    let mut live = as_live(sample_org());
    live.repositories[0].web_commit_signoff_required = Some(false);

    let plan = engine().diff(&live, &desired);
    let repo_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository)
        .expect("repository change");
    assert!(repo_change
        .deltas
        .iter()
        .all(|d| d.field != "web_commit_signoff_required"));
}

#[test]
fn test_signoff_cascade_skips_repositories_already_at_target() {
    let mut desired = sample_org();
    desired.settings.web_commit_signoff_required = Some(true);
    desired.repositories[0].web_commit_signoff_required = None;
    let mut live = as_live(sample_org());
    live.repositories[0].web_commit_signoff_required = Some(true); // already there

    let plan = engine().diff(&live, &desired);
    let repo_change = plan
        .changes
        .iter()
        .find(|c| c.kind == ResourceKind::Repository)
        .expect("repository change");
    assert!(repo_change.is_noop_tree());
}

#[test]
fn test_values_equal_handles_arrays_as_sets() {
    assert!(values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
    assert!(!values_equal(&json!(["a"]), &json!(["a", "a"])));
    assert!(!values_equal(&json!(["a", "b"]), &json!(["a", "c"])));
    assert!(values_equal(&json!("x"), &json!("x")));
    assert!(!values_equal(&json!(1), &json!(2)));
}
