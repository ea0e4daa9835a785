//! Conversions between GitHub wire payloads and the canonical model.
//!
//! The fetcher normalizes three heterogeneous sources (REST JSON, GraphQL
//! nodes, scraped form values) into model types; the executor performs the
//! reverse translation when building mutation payloads. Both directions live
//! here so the two stay in sync.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::warn;

use config_model::bypass_actor::{repository_role_name, ActorKind, BypassActor, BypassScope};
use config_model::schema::{schema_for, ProviderTag, ResourceKind};
use config_model::{
    BranchProtectionRule, EnvironmentConfig, RepositoryConfig, RulesetConfig, WebhookConfig,
    REDACTED_VALUE,
};

use crate::errors::{EngineError, EngineResult};

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;

/// Model field name to GraphQL field name, for branch-protection rules.
///
/// The same names are used by the retrieval query and the create/update
/// mutation inputs, with the four allowance connections swapping to
/// `...ActorIds` on the mutation side.
pub const BPR_FIELD_MAP: &[(&str, &str)] = &[
    ("requires_approving_reviews", "requiresApprovingReviews"),
    (
        "required_approving_review_count",
        "requiredApprovingReviewCount",
    ),
    ("dismisses_stale_reviews", "dismissesStaleReviews"),
    ("requires_code_owner_reviews", "requiresCodeOwnerReviews"),
    ("require_last_push_approval", "requireLastPushApproval"),
    ("requires_status_checks", "requiresStatusChecks"),
    (
        "requires_strict_status_checks",
        "requiresStrictStatusChecks",
    ),
    ("required_status_checks", "requiredStatusCheckContexts"),
    (
        "requires_conversation_resolution",
        "requiresConversationResolution",
    ),
    ("requires_commit_signatures", "requiresCommitSignatures"),
    ("requires_linear_history", "requiresLinearHistory"),
    ("requires_deployments", "requiresDeployments"),
    (
        "required_deployment_environments",
        "requiredDeploymentEnvironments",
    ),
    ("is_admin_enforced", "isAdminEnforced"),
    ("allows_force_pushes", "allowsForcePushes"),
    ("allows_deletions", "allowsDeletions"),
    ("lock_branch", "lockBranch"),
    ("lock_allows_fetch_and_merge", "lockAllowsFetchAndMerge"),
    ("blocks_creations", "blocksCreations"),
    ("restricts_pushes", "restrictsPushes"),
    ("restricts_review_dismissals", "restrictsReviewDismissals"),
];

/// Model actor-list field to (query connection, mutation id field).
pub const BPR_ACTOR_FIELDS: &[(&str, &str, &str)] = &[
    (
        "bypass_pull_request_allowances",
        "bypassPullRequestAllowances",
        "bypassPullRequestActorIds",
    ),
    (
        "bypass_force_push_allowances",
        "bypassForcePushAllowances",
        "bypassForcePushActorIds",
    ),
    ("push_restrictions", "pushAllowances", "pushActorIds"),
    (
        "review_dismissal_allowances",
        "reviewDismissalAllowances",
        "reviewDismissalActorIds",
    ),
];

/// GraphQL field name for a model field, when one exists.
pub fn bpr_graphql_field(model_field: &str) -> Option<&'static str> {
    BPR_FIELD_MAP
        .iter()
        .find(|(model, _)| *model == model_field)
        .map(|(_, graphql)| *graphql)
}

/// Builds a model branch-protection rule from a (flattened) GraphQL node.
pub fn bpr_from_node(node: &Value) -> EngineResult<BranchProtectionRule> {
    let pattern = node
        .get("pattern")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Payload("branch protection rule without pattern".into()))?;

    let mut out = Map::new();
    out.insert("pattern".to_string(), json!(pattern));
    for (model_field, graphql_field) in BPR_FIELD_MAP {
        if let Some(value) = node.get(*graphql_field) {
            if !value.is_null() {
                out.insert((*model_field).to_string(), value.clone());
            }
        }
    }
    for (model_field, connection, _) in BPR_ACTOR_FIELDS {
        let actors = node
            .get(*connection)
            .and_then(Value::as_array)
            .map(|nodes| actor_strings(nodes))
            .unwrap_or_default();
        out.insert((*model_field).to_string(), json!(actors));
    }

    serde_json::from_value(Value::Object(out))
        .map_err(|e| EngineError::Payload(format!("branch protection rule for '{pattern}': {e}")))
}

fn actor_strings(nodes: &[Value]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|node| match BypassActor::from_graphql_node(node) {
            Ok(actor) => Some(actor.to_string()),
            Err(e) => {
                warn!(error = %e, "Skipping unresolvable allowance actor");
                None
            }
        })
        .collect()
}

/// Builds a model webhook from the REST hook payload.
pub fn webhook_from_wire(wire: &Value) -> Option<WebhookConfig> {
    let config = wire.get("config")?;
    let url = config.get("url").and_then(Value::as_str)?;
    Some(WebhookConfig {
        url: url.to_string(),
        aliases: Vec::new(),
        active: wire.get("active").and_then(Value::as_bool),
        events: wire
            .get("events")
            .and_then(Value::as_array)
            .map(|events| {
                events
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        content_type: config
            .get("content_type")
            .and_then(Value::as_str)
            .map(str::to_string),
        insecure_ssl: insecure_ssl_from_wire(config.get("insecure_ssl")),
        // GitHub redacts hook secrets; presence is all we learn.
        secret: config
            .get("secret")
            .and_then(Value::as_str)
            .map(|_| REDACTED_VALUE.to_string()),
    })
}

/// Builds the REST hook payload for create/update.
pub fn webhook_to_wire(hook: &WebhookConfig, resolved_secret: Option<&str>) -> Value {
    let mut config = Map::new();
    config.insert("url".to_string(), json!(hook.url));
    config.insert(
        "content_type".to_string(),
        json!(hook.content_type.as_deref().unwrap_or("json")),
    );
    config.insert(
        "insecure_ssl".to_string(),
        json!(if hook.insecure_ssl.unwrap_or(false) {
            "1"
        } else {
            "0"
        }),
    );
    if let Some(secret) = resolved_secret {
        config.insert("secret".to_string(), json!(secret));
    }
    json!({
        "name": "web",
        "active": hook.active.unwrap_or(true),
        "events": hook.events,
        "config": Value::Object(config),
    })
}

/// GitHub's hook API uses "0"/"1" strings for `insecure_ssl`.
fn insecure_ssl_from_wire(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::String(s) => Some(s == "1"),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_u64() == Some(1)),
        _ => None,
    }
}

/// Directory of numeric ids the ruleset REST shape uses for actors.
#[derive(Debug, Default, Clone)]
pub struct ActorDirectory {
    /// Organization login, used to print team actors as `@org/slug`.
    pub org: String,
    /// Team database id to slug.
    pub teams_by_id: HashMap<u64, String>,
    /// App database id to slug.
    pub apps_by_id: HashMap<u64, String>,
}

/// Builds a model ruleset from the REST detail payload.
pub fn ruleset_from_wire(wire: &Value, actors: &ActorDirectory) -> EngineResult<RulesetConfig> {
    let name = wire
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Payload("ruleset without name".into()))?;

    let mut ruleset = RulesetConfig::new(name);
    ruleset.target = wire.get("target").and_then(Value::as_str).map(str::to_string);
    ruleset.enforcement = wire
        .get("enforcement")
        .and_then(Value::as_str)
        .map(str::to_string);
    ruleset.include_refs = string_list(wire.pointer("/conditions/ref_name/include"));
    ruleset.exclude_refs = string_list(wire.pointer("/conditions/ref_name/exclude"));
    ruleset.bypass_actors = wire
        .get("bypass_actors")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| ruleset_actor_string(entry, actors))
                .collect()
        })
        .unwrap_or_default();

    // Restriction rules are presence-based on the wire; absent rules mean
    // the operation is allowed.
    ruleset.allows_creations = Some(true);
    ruleset.allows_updates = Some(true);
    ruleset.allows_deletions = Some(true);
    ruleset.requires_linear_history = Some(false);
    ruleset.requires_commit_signatures = Some(false);
    ruleset.requires_pull_request = Some(false);
    ruleset.requires_status_checks = Some(false);

    for rule in wire
        .get("rules")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let rule_type = rule.get("type").and_then(Value::as_str).unwrap_or_default();
        let parameters = rule.get("parameters");
        match rule_type {
            "creation" => ruleset.allows_creations = Some(false),
            "update" => ruleset.allows_updates = Some(false),
            "deletion" => ruleset.allows_deletions = Some(false),
            "required_linear_history" => ruleset.requires_linear_history = Some(true),
            "required_signatures" => ruleset.requires_commit_signatures = Some(true),
            "pull_request" => {
                ruleset.requires_pull_request = Some(true);
                if let Some(parameters) = parameters {
                    ruleset.required_approving_review_count = parameters
                        .get("required_approving_review_count")
                        .and_then(Value::as_u64)
                        .map(|count| count as u32);
                    ruleset.dismisses_stale_reviews = parameters
                        .get("dismiss_stale_reviews_on_push")
                        .and_then(Value::as_bool);
                    ruleset.requires_code_owner_review = parameters
                        .get("require_code_owner_review")
                        .and_then(Value::as_bool);
                    ruleset.require_last_push_approval = parameters
                        .get("require_last_push_approval")
                        .and_then(Value::as_bool);
                    ruleset.requires_review_thread_resolution = parameters
                        .get("required_review_thread_resolution")
                        .and_then(Value::as_bool);
                }
            }
            "required_status_checks" => {
                ruleset.requires_status_checks = Some(true);
                if let Some(parameters) = parameters {
                    ruleset.required_status_checks = parameters
                        .get("required_status_checks")
                        .and_then(Value::as_array)
                        .map(|checks| {
                            checks
                                .iter()
                                .filter_map(|check| check.get("context"))
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    ruleset.requires_strict_status_checks = parameters
                        .get("strict_required_status_checks_policy")
                        .and_then(Value::as_bool);
                }
            }
            other => {
                warn!(rule_type = other, "Ignoring unmodeled ruleset rule");
            }
        }
    }

    Ok(ruleset)
}

fn ruleset_actor_string(entry: &Value, actors: &ActorDirectory) -> Option<String> {
    let actor_type = entry.get("actor_type").and_then(Value::as_str)?;
    let actor_id = entry.get("actor_id").and_then(Value::as_u64);
    let kind = match actor_type {
        "RepositoryRole" => ActorKind::Role(repository_role_name(actor_id?)?.to_string()),
        "OrganizationAdmin" => ActorKind::Role("organization_admin".to_string()),
        "Team" => {
            let slug = actors.teams_by_id.get(&actor_id?)?;
            ActorKind::Team {
                org: actors.org.clone(),
                slug: slug.clone(),
            }
        }
        "Integration" => ActorKind::App(actors.apps_by_id.get(&actor_id?)?.clone()),
        other => {
            warn!(actor_type = other, "Ignoring unmodeled bypass actor type");
            return None;
        }
    };
    let actor = BypassActor { kind, scope: None };
    let actor = match entry.get("bypass_mode").and_then(Value::as_str) {
        Some("pull_request") => actor.with_scope(BypassScope::PullRequest),
        _ => actor,
    };
    Some(actor.to_string())
}

/// Builds the REST ruleset payload (create and update use the same shape).
///
/// `resolved_actors` must already carry numeric ids, produced by the
/// executor's actor resolution.
pub fn ruleset_to_wire(ruleset: &RulesetConfig, resolved_actors: Vec<Value>) -> Value {
    let mut rules = Vec::new();
    if ruleset.allows_creations == Some(false) {
        rules.push(json!({ "type": "creation" }));
    }
    if ruleset.allows_updates == Some(false) {
        rules.push(json!({ "type": "update" }));
    }
    if ruleset.allows_deletions == Some(false) {
        rules.push(json!({ "type": "deletion" }));
    }
    if ruleset.requires_linear_history == Some(true) {
        rules.push(json!({ "type": "required_linear_history" }));
    }
    if ruleset.requires_commit_signatures == Some(true) {
        rules.push(json!({ "type": "required_signatures" }));
    }
    if ruleset.requires_pull_request == Some(true) {
        rules.push(json!({
            "type": "pull_request",
            "parameters": {
                "required_approving_review_count":
                    ruleset.required_approving_review_count.unwrap_or(0),
                "dismiss_stale_reviews_on_push":
                    ruleset.dismisses_stale_reviews.unwrap_or(false),
                "require_code_owner_review":
                    ruleset.requires_code_owner_review.unwrap_or(false),
                "require_last_push_approval":
                    ruleset.require_last_push_approval.unwrap_or(false),
                "required_review_thread_resolution":
                    ruleset.requires_review_thread_resolution.unwrap_or(false),
            },
        }));
    }
    if ruleset.requires_status_checks == Some(true) {
        let checks: Vec<Value> = ruleset
            .required_status_checks
            .iter()
            .map(|context| json!({ "context": context }))
            .collect();
        rules.push(json!({
            "type": "required_status_checks",
            "parameters": {
                "required_status_checks": checks,
                "strict_required_status_checks_policy":
                    ruleset.requires_strict_status_checks.unwrap_or(false),
            },
        }));
    }

    json!({
        "name": ruleset.name,
        "target": ruleset.target.as_deref().unwrap_or("branch"),
        "enforcement": ruleset.enforcement.as_deref().unwrap_or("active"),
        "conditions": {
            "ref_name": {
                "include": ruleset.include_refs,
                "exclude": ruleset.exclude_refs,
            },
        },
        "bypass_actors": resolved_actors,
        "rules": rules,
    })
}

/// Builds a model environment from the REST payload plus the custom branch
/// policies fetched separately.
pub fn environment_from_wire(
    wire: &Value,
    branch_policies: Vec<String>,
    org: &str,
) -> EngineResult<EnvironmentConfig> {
    let name = wire
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Payload("environment without name".into()))?;

    let mut environment = EnvironmentConfig::new(name);
    environment.branch_policies = branch_policies;

    for rule in wire
        .get("protection_rules")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        match rule.get("type").and_then(Value::as_str) {
            Some("wait_timer") => {
                environment.wait_timer = rule
                    .get("wait_timer")
                    .and_then(Value::as_u64)
                    .map(|minutes| minutes as u32);
            }
            Some("required_reviewers") => {
                environment.prevent_self_review =
                    rule.get("prevent_self_review").and_then(Value::as_bool);
                environment.reviewers = rule
                    .get("reviewers")
                    .and_then(Value::as_array)
                    .map(|reviewers| {
                        reviewers
                            .iter()
                            .filter_map(|entry| reviewer_string(entry, org))
                            .collect()
                    })
                    .unwrap_or_default();
            }
            _ => {}
        }
    }

    environment.deployment_branch_policy = Some(
        match wire.get("deployment_branch_policy") {
            Some(Value::Object(policy)) => {
                if policy
                    .get("custom_branch_policies")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    "custom"
                } else {
                    "protected"
                }
            }
            _ => "all",
        }
        .to_string(),
    );

    Ok(environment)
}

fn reviewer_string(entry: &Value, org: &str) -> Option<String> {
    let reviewer = entry.get("reviewer")?;
    match entry.get("type").and_then(Value::as_str)? {
        "User" => {
            let login = reviewer.get("login").and_then(Value::as_str)?;
            Some(format!("@{login}"))
        }
        "Team" => {
            let slug = reviewer.get("slug").and_then(Value::as_str)?;
            Some(format!("@{org}/{slug}"))
        }
        _ => None,
    }
}

/// Builds a model repository from the REST payload, flattening the nested
/// `security_and_analysis` block into the flat model fields.
pub fn repository_from_wire(wire: &Value) -> EngineResult<RepositoryConfig> {
    let schema = schema_for(ResourceKind::Repository);
    let mut projected = schema.project(wire);

    if let Some(object) = projected.as_object_mut() {
        if let Some(security) = wire.get("security_and_analysis") {
            for (wire_field, model_field) in [
                ("secret_scanning", "secret_scanning"),
                (
                    "secret_scanning_push_protection",
                    "secret_scanning_push_protection",
                ),
            ] {
                if let Some(status) = security
                    .pointer(&format!("/{wire_field}/status"))
                    .and_then(Value::as_str)
                {
                    object.insert(model_field.to_string(), json!(status));
                }
            }
        }
    }

    serde_json::from_value(projected)
        .map_err(|e| EngineError::Payload(format!("repository payload: {e}")))
}

/// The complete organization-settings REST payload.
///
/// Organization updates always send every REST-reachable managed setting,
/// not just the changed ones, to avoid partial-update inconsistencies.
/// Web-tagged fields never appear: they travel through the web channel.
pub fn org_settings_rest_payload(settings: &Value) -> Value {
    let schema = schema_for(ResourceKind::Organization);
    let mut out = Map::new();
    for field in schema.fields {
        if field.provider != ProviderTag::Rest {
            continue;
        }
        if let Some(value) = settings.get(field.name) {
            if !value.is_null() {
                out.insert(field.name.to_string(), value.clone());
            }
        }
    }
    Value::Object(out)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
