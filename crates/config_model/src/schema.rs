//! Field schemas for every resource type.
//!
//! Each managed field is described once: its value type, the provider that
//! can read and write it (REST/GraphQL or the web UI), whether its value is
//! secret, and whether a change forces a delete-and-recreate. The schema is
//! the single source of truth for document validation, for deciding what a
//! `--no-web-ui` run must skip, and for identity matching of list-valued
//! collections.
//!
//! Provider tags are fixed metadata resolved here at definition time; no
//! runtime type inspection decides channel selection.

use serde_json::{Map, Value};

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// The channel able to read and write a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    /// REST or GraphQL API.
    Rest,
    /// Web UI form scraping only.
    Web,
}

/// Coarse value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Bool,
    Int,
    StrList,
}

/// Description of one managed field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub value_type: ValueType,
    pub provider: ProviderTag,
    /// Secret-valued: live reads are redacted, so the diff is structural
    /// unless explicitly forced.
    pub secret: bool,
    /// GitHub cannot change this field in place; a difference forces
    /// delete-then-recreate of the whole resource.
    pub forces_recreate: bool,
}

const fn rest(name: &'static str, value_type: ValueType) -> FieldSchema {
    FieldSchema {
        name,
        value_type,
        provider: ProviderTag::Rest,
        secret: false,
        forces_recreate: false,
    }
}

const fn web(name: &'static str, value_type: ValueType) -> FieldSchema {
    FieldSchema {
        name,
        value_type,
        provider: ProviderTag::Web,
        secret: false,
        forces_recreate: false,
    }
}

const fn secret(name: &'static str) -> FieldSchema {
    FieldSchema {
        name,
        value_type: ValueType::Str,
        provider: ProviderTag::Rest,
        secret: true,
        forces_recreate: false,
    }
}

const fn recreate(name: &'static str, value_type: ValueType) -> FieldSchema {
    FieldSchema {
        name,
        value_type,
        provider: ProviderTag::Rest,
        secret: false,
        forces_recreate: true,
    }
}

/// The resource types making up the configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Organization,
    Repository,
    BranchProtectionRule,
    Ruleset,
    Webhook,
    Secret,
    Variable,
    Environment,
    Team,
    Role,
}

impl ResourceKind {
    /// Human-readable singular name used in plan rendering.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Repository => "repository",
            Self::BranchProtectionRule => "branch_protection_rule",
            Self::Ruleset => "ruleset",
            Self::Webhook => "webhook",
            Self::Secret => "secret",
            Self::Variable => "variable",
            Self::Environment => "environment",
            Self::Team => "team",
            Self::Role => "role",
        }
    }
}

/// Schema of one resource type: its fields plus how instances are
/// identified within their parent collection.
#[derive(Debug)]
pub struct ResourceSchema {
    pub kind: ResourceKind,
    pub fields: &'static [FieldSchema],
    /// Field whose value is the identity within the parent collection.
    pub identity_field: &'static str,
    /// Optional field listing alternate identities for rename detection.
    pub alias_field: Option<&'static str>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The primary identity of an instance.
    pub fn identity_of(&self, value: &Value) -> Option<String> {
        value
            .get(self.identity_field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Every key an instance answers to: primary identity plus aliases.
    pub fn identity_keys(&self, value: &Value) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(primary) = self.identity_of(value) {
            keys.push(primary);
        }
        if let Some(alias_field) = self.alias_field {
            if let Some(aliases) = value.get(alias_field).and_then(Value::as_array) {
                keys.extend(
                    aliases
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                );
            }
        }
        keys
    }

    /// The fields a diff may consider, honoring web-channel exclusion.
    ///
    /// With `include_web` off, web-tagged fields are excluded entirely, not
    /// merely hidden from output.
    pub fn diffable_fields(&self, include_web: bool) -> impl Iterator<Item = &FieldSchema> {
        self.fields
            .iter()
            .filter(move |field| include_web || field.provider == ProviderTag::Rest)
    }

    /// Projects a raw API payload down to the fields this schema declares
    /// (plus identity and aliases). Used to build model instances from REST
    /// responses that carry many unmanaged fields.
    pub fn project(&self, raw: &Value) -> Value {
        let mut out = Map::new();
        if let Some(object) = raw.as_object() {
            for (key, value) in object {
                let keep = key == self.identity_field
                    || Some(key.as_str()) == self.alias_field
                    || self.field(key).is_some();
                if keep && !value.is_null() {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(out)
    }
}

/// Organization-wide settings.
pub static ORGANIZATION_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Organization,
    identity_field: "github_id",
    alias_field: None,
    fields: &[
        rest("name", ValueType::Str),
        rest("description", ValueType::Str),
        rest("company", ValueType::Str),
        rest("email", ValueType::Str),
        rest("billing_email", ValueType::Str),
        rest("location", ValueType::Str),
        rest("blog", ValueType::Str),
        rest("twitter_username", ValueType::Str),
        rest("has_organization_projects", ValueType::Bool),
        rest("has_repository_projects", ValueType::Bool),
        rest("members_can_create_pages", ValueType::Bool),
        rest("members_can_create_public_pages", ValueType::Bool),
        rest("members_can_create_private_pages", ValueType::Bool),
        rest("default_repository_permission", ValueType::Str),
        rest("members_can_create_private_repositories", ValueType::Bool),
        rest("members_can_create_public_repositories", ValueType::Bool),
        rest("members_can_create_internal_repositories", ValueType::Bool),
        rest("members_can_fork_private_repositories", ValueType::Bool),
        rest("web_commit_signoff_required", ValueType::Bool),
        rest(
            "dependabot_alerts_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest(
            "dependabot_security_updates_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest(
            "dependency_graph_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest(
            "advanced_security_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest(
            "secret_scanning_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest(
            "secret_scanning_push_protection_enabled_for_new_repositories",
            ValueType::Bool,
        ),
        rest("has_discussions", ValueType::Bool),
        web("discussion_source_repository", ValueType::Str),
        web("readers_can_create_discussions", ValueType::Bool),
        web("two_factor_requirement", ValueType::Bool),
        web("members_can_change_repo_visibility", ValueType::Bool),
        web("members_can_delete_repositories", ValueType::Bool),
        web("members_can_delete_issues", ValueType::Bool),
        web("members_can_create_teams", ValueType::Bool),
        web("members_can_change_project_visibility", ValueType::Bool),
        web("default_branch_name", ValueType::Str),
        web("packages_containers_public", ValueType::Bool),
        web("packages_containers_internal", ValueType::Bool),
    ],
};

/// Repository scalar settings.
pub static REPOSITORY_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Repository,
    identity_field: "name",
    alias_field: Some("aliases"),
    fields: &[
        rest("description", ValueType::Str),
        rest("homepage", ValueType::Str),
        rest("private", ValueType::Bool),
        rest("visibility", ValueType::Str),
        rest("topics", ValueType::StrList),
        rest("default_branch", ValueType::Str),
        rest("archived", ValueType::Bool),
        rest("is_template", ValueType::Bool),
        rest("has_issues", ValueType::Bool),
        rest("has_projects", ValueType::Bool),
        rest("has_wiki", ValueType::Bool),
        rest("has_discussions", ValueType::Bool),
        rest("allow_squash_merge", ValueType::Bool),
        rest("allow_merge_commit", ValueType::Bool),
        rest("allow_rebase_merge", ValueType::Bool),
        rest("allow_auto_merge", ValueType::Bool),
        rest("allow_update_branch", ValueType::Bool),
        rest("delete_branch_on_merge", ValueType::Bool),
        rest("squash_merge_commit_title", ValueType::Str),
        rest("squash_merge_commit_message", ValueType::Str),
        rest("merge_commit_title", ValueType::Str),
        rest("merge_commit_message", ValueType::Str),
        rest("web_commit_signoff_required", ValueType::Bool),
        rest("secret_scanning", ValueType::Str),
        rest("secret_scanning_push_protection", ValueType::Str),
        rest("dependabot_security_updates_enabled", ValueType::Bool),
        rest("private_vulnerability_reporting_enabled", ValueType::Bool),
        rest("gh_pages_build_type", ValueType::Str),
        rest("gh_pages_source_branch", ValueType::Str),
        rest("gh_pages_source_path", ValueType::Str),
    ],
};

/// Classic branch-protection rules, keyed by pattern.
pub static BRANCH_PROTECTION_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::BranchProtectionRule,
    identity_field: "pattern",
    alias_field: None,
    fields: &[
        rest("requires_approving_reviews", ValueType::Bool),
        rest("required_approving_review_count", ValueType::Int),
        rest("dismisses_stale_reviews", ValueType::Bool),
        rest("requires_code_owner_reviews", ValueType::Bool),
        rest("require_last_push_approval", ValueType::Bool),
        rest("requires_status_checks", ValueType::Bool),
        rest("requires_strict_status_checks", ValueType::Bool),
        rest("required_status_checks", ValueType::StrList),
        rest("requires_conversation_resolution", ValueType::Bool),
        rest("requires_commit_signatures", ValueType::Bool),
        rest("requires_linear_history", ValueType::Bool),
        rest("requires_deployments", ValueType::Bool),
        rest("required_deployment_environments", ValueType::StrList),
        rest("is_admin_enforced", ValueType::Bool),
        rest("allows_force_pushes", ValueType::Bool),
        rest("allows_deletions", ValueType::Bool),
        rest("lock_branch", ValueType::Bool),
        rest("lock_allows_fetch_and_merge", ValueType::Bool),
        rest("blocks_creations", ValueType::Bool),
        rest("restricts_pushes", ValueType::Bool),
        rest("restricts_review_dismissals", ValueType::Bool),
        rest("bypass_pull_request_allowances", ValueType::StrList),
        rest("bypass_force_push_allowances", ValueType::StrList),
        rest("push_restrictions", ValueType::StrList),
        rest("review_dismissal_allowances", ValueType::StrList),
    ],
};

/// Rulesets at either scope, keyed by name.
pub static RULESET_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Ruleset,
    identity_field: "name",
    alias_field: None,
    fields: &[
        // A branch ruleset cannot become a tag or push ruleset in place.
        recreate("target", ValueType::Str),
        rest("enforcement", ValueType::Str),
        rest("include_refs", ValueType::StrList),
        rest("exclude_refs", ValueType::StrList),
        rest("bypass_actors", ValueType::StrList),
        rest("allows_creations", ValueType::Bool),
        rest("allows_updates", ValueType::Bool),
        rest("allows_deletions", ValueType::Bool),
        rest("requires_linear_history", ValueType::Bool),
        rest("requires_commit_signatures", ValueType::Bool),
        rest("requires_pull_request", ValueType::Bool),
        rest("required_approving_review_count", ValueType::Int),
        rest("dismisses_stale_reviews", ValueType::Bool),
        rest("requires_code_owner_review", ValueType::Bool),
        rest("require_last_push_approval", ValueType::Bool),
        rest("requires_review_thread_resolution", ValueType::Bool),
        rest("requires_status_checks", ValueType::Bool),
        rest("requires_strict_status_checks", ValueType::Bool),
        rest("required_status_checks", ValueType::StrList),
    ],
};

/// Webhooks at either scope, keyed by delivery URL (or a listed alias).
pub static WEBHOOK_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Webhook,
    identity_field: "url",
    alias_field: Some("aliases"),
    fields: &[
        // Moving the endpoint invalidates GitHub's delivery verification and
        // the write-only shared secret, so the hook is replaced.
        recreate("url", ValueType::Str),
        rest("active", ValueType::Bool),
        rest("events", ValueType::StrList),
        rest("content_type", ValueType::Str),
        rest("insecure_ssl", ValueType::Bool),
        secret("secret"),
    ],
};

/// Actions secrets, keyed by name. Values are write-only.
pub static SECRET_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Secret,
    identity_field: "name",
    alias_field: None,
    fields: &[
        secret("value"),
        rest("visibility", ValueType::Str),
        rest("selected_repositories", ValueType::StrList),
    ],
};

/// Actions variables, keyed by name. Values are readable and diff normally.
pub static VARIABLE_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Variable,
    identity_field: "name",
    alias_field: None,
    fields: &[
        rest("value", ValueType::Str),
        rest("visibility", ValueType::Str),
        rest("selected_repositories", ValueType::StrList),
    ],
};

/// Deployment environments, keyed by name.
pub static ENVIRONMENT_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Environment,
    identity_field: "name",
    alias_field: None,
    fields: &[
        rest("wait_timer", ValueType::Int),
        rest("reviewers", ValueType::StrList),
        rest("prevent_self_review", ValueType::Bool),
        rest("deployment_branch_policy", ValueType::Str),
        rest("branch_policies", ValueType::StrList),
    ],
};

/// Teams, keyed by name.
pub static TEAM_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Team,
    identity_field: "name",
    alias_field: None,
    fields: &[
        rest("description", ValueType::Str),
        rest("privacy", ValueType::Str),
        rest("notification_setting", ValueType::Str),
        rest("members", ValueType::StrList),
        rest("maintainers", ValueType::StrList),
    ],
};

/// Custom repository roles, keyed by name.
pub static ROLE_SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Role,
    identity_field: "name",
    alias_field: None,
    fields: &[
        rest("description", ValueType::Str),
        rest("base_role", ValueType::Str),
        rest("permissions", ValueType::StrList),
    ],
};

/// Looks up the schema for a resource kind.
pub fn schema_for(kind: ResourceKind) -> &'static ResourceSchema {
    match kind {
        ResourceKind::Organization => &ORGANIZATION_SCHEMA,
        ResourceKind::Repository => &REPOSITORY_SCHEMA,
        ResourceKind::BranchProtectionRule => &BRANCH_PROTECTION_SCHEMA,
        ResourceKind::Ruleset => &RULESET_SCHEMA,
        ResourceKind::Webhook => &WEBHOOK_SCHEMA,
        ResourceKind::Secret => &SECRET_SCHEMA,
        ResourceKind::Variable => &VARIABLE_SCHEMA,
        ResourceKind::Environment => &ENVIRONMENT_SCHEMA,
        ResourceKind::Team => &TEAM_SCHEMA,
        ResourceKind::Role => &ROLE_SCHEMA,
    }
}
