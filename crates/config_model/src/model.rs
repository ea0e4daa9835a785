//! Canonical in-memory representation of a GitHub organization.
//!
//! The same types describe both sides of a reconciliation: the desired state
//! (deserialized from the resolved JSON document) and the live state (built
//! by the fetcher from REST/GraphQL/web reads). Scalar fields are `Option`;
//! `None` means the field is not managed and produces no diff. List-valued
//! fields are sets keyed by identity, never by position.
//!
//! Every struct rejects undeclared fields (`deny_unknown_fields`), which is
//! what gives the published JSON Schemas their `additionalProperties: false`
//! contract.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;

/// Placeholder GitHub returns in place of secret material.
pub const REDACTED_VALUE: &str = "********";

/// Whether a live value is GitHub's redaction placeholder.
pub fn is_redacted(value: &str) -> bool {
    value == REDACTED_VALUE
}

/// A resolved desired-state document: one or more organizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct DesiredStateDocument {
    #[serde(default)]
    pub organizations: Vec<OrganizationConfig>,
}

/// Root of the configuration tree for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct OrganizationConfig {
    /// Organization login on GitHub.
    pub github_id: String,

    #[serde(default)]
    pub settings: OrganizationSettings,

    #[serde(default)]
    pub roles: Vec<CustomRole>,

    #[serde(default)]
    pub teams: Vec<TeamConfig>,

    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    #[serde(default)]
    pub secrets: Vec<SecretConfig>,

    #[serde(default)]
    pub variables: Vec<VariableConfig>,

    #[serde(default)]
    pub rulesets: Vec<RulesetConfig>,

    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl OrganizationConfig {
    pub fn new(github_id: impl Into<String>) -> Self {
        Self {
            github_id: github_id.into(),
            ..Self::default()
        }
    }

    /// Looks up a repository by name.
    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|repo| repo.name == name)
    }
}

/// Organization-wide settings.
///
/// Most of these map onto `PATCH /orgs/{org}`; the remainder only exist as
/// web UI form controls and are read and written through the web channel.
/// Which is which is recorded in the field schema, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct OrganizationSettings {
    // -- profile ---------------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_username: Option<String>,

    // -- projects and pages ---------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_organization_projects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_repository_projects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_pages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_public_pages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_private_pages: Option<bool>,

    // -- member repository permissions -----------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_repository_permission: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_private_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_public_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_internal_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_fork_private_repositories: Option<bool>,

    /// Require contributors to sign off on web-based commits.
    ///
    /// Changing this at organization scope cascades onto every repository
    /// that does not explicitly override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_commit_signoff_required: Option<bool>,

    // -- security defaults for new repositories ---------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependabot_alerts_enabled_for_new_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependabot_security_updates_enabled_for_new_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_graph_enabled_for_new_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_security_enabled_for_new_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning_enabled_for_new_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning_push_protection_enabled_for_new_repositories: Option<bool>,

    // -- discussions ------------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_discussions: Option<bool>,

    /// Repository hosting organization discussions, as `org/repo`.
    /// Only reachable through the web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_source_repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readers_can_create_discussions: Option<bool>,

    // -- web-only member policies ----------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_requirement: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_change_repo_visibility: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_delete_repositories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_delete_issues: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_create_teams: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_can_change_project_visibility: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages_containers_public: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages_containers_internal: Option<bool>,
}

/// A repository and everything nested beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Repository name; the identity key within the organization.
    pub name: String,

    /// Previous names of this repository. A live repository matching an
    /// alias is treated as the same resource pending rename, not as a
    /// delete/create pair.
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_template: Option<bool>,

    // -- features ---------------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_issues: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_projects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_wiki: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_discussions: Option<bool>,

    // -- merge policy -----------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_squash_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_merge_commit: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rebase_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_auto_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_update_branch: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_branch_on_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash_merge_commit_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squash_merge_commit_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_commit_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_commit_signoff_required: Option<bool>,

    // -- security ---------------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_scanning_push_protection: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependabot_security_updates_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_vulnerability_reporting_enabled: Option<bool>,

    // -- pages ------------------------------------------------------------
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh_pages_build_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh_pages_source_branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh_pages_source_path: Option<String>,

    // -- nested collections ----------------------------------------------
    #[serde(default)]
    pub branch_protection_rules: Vec<BranchProtectionRule>,

    #[serde(default)]
    pub rulesets: Vec<RulesetConfig>,

    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    #[serde(default)]
    pub secrets: Vec<SecretConfig>,

    #[serde(default)]
    pub variables: Vec<VariableConfig>,

    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A classic branch-protection rule, keyed by its branch name pattern.
///
/// The four actor lists use the bypass-actor string format
/// (`#role`, `@org/team`, `@login`, `app-slug`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct BranchProtectionRule {
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_approving_reviews: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approving_review_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismisses_stale_reviews: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_code_owner_reviews: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_last_push_approval: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_status_checks: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_strict_status_checks: Option<bool>,

    #[serde(default)]
    pub required_status_checks: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_conversation_resolution: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_commit_signatures: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_linear_history: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_deployments: Option<bool>,

    #[serde(default)]
    pub required_deployment_environments: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin_enforced: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_force_pushes: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_deletions: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_branch: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_allows_fetch_and_merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_creations: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricts_pushes: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricts_review_dismissals: Option<bool>,

    #[serde(default)]
    pub bypass_pull_request_allowances: Vec<String>,

    #[serde(default)]
    pub bypass_force_push_allowances: Vec<String>,

    #[serde(default)]
    pub push_restrictions: Vec<String>,

    #[serde(default)]
    pub review_dismissal_allowances: Vec<String>,
}

impl BranchProtectionRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }
}

/// A ruleset at organization or repository scope, keyed by name.
///
/// Rulesets are the newer superset of branch-protection semantics; the
/// bypass actors use the same string format, with `#role` additionally
/// allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct RulesetConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<String>,

    #[serde(default)]
    pub include_refs: Vec<String>,

    #[serde(default)]
    pub exclude_refs: Vec<String>,

    #[serde(default)]
    pub bypass_actors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_creations: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_updates: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_deletions: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_linear_history: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_commit_signatures: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_pull_request: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approving_review_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismisses_stale_reviews: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_code_owner_review: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_last_push_approval: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_review_thread_resolution: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_status_checks: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_strict_status_checks: Option<bool>,

    #[serde(default)]
    pub required_status_checks: Vec<String>,
}

impl RulesetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A webhook at organization or repository scope.
///
/// Identity is the delivery `url`, or any listed alias when the endpoint
/// moved. The shared secret is write-only: GitHub redacts it on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    pub url: String,

    /// Previous delivery URLs treated as the same webhook.
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_ssl: Option<bool>,

    /// Shared secret, as plaintext or a credential-provider reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// An Actions secret. GitHub never returns the value, so live state only
/// carries the name and metadata; the diff is structural unless forced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct SecretConfig {
    pub name: String,

    /// Plaintext (`plain:...`) or provider reference (`vault:path/to/key`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Organization scope only: `all`, `private`, or `selected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    #[serde(default)]
    pub selected_repositories: Vec<String>,
}

impl SecretConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// An Actions variable. Unlike secrets these are readable, so values diff
/// normally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct VariableConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    #[serde(default)]
    pub selected_repositories: Vec<String>,
}

impl VariableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A deployment environment of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub name: String,

    /// Minutes to wait before allowing deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timer: Option<u32>,

    /// Required reviewers in bypass-actor string format (`@login` or
    /// `@org/team`).
    #[serde(default)]
    pub reviewers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevent_self_review: Option<bool>,

    /// `protected`, `custom`, or `all`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_branch_policy: Option<String>,

    /// Branch name patterns for the `custom` policy.
    #[serde(default)]
    pub branch_policies: Vec<String>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// An organization team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct TeamConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `secret` or `closed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_setting: Option<String>,

    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<String>,
}

impl TeamConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A custom repository role defined at organization scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct CustomRole {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Role the permissions extend: `read`, `triage`, `write`, `maintain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_role: Option<String>,

    #[serde(default)]
    pub permissions: Vec<String>,
}

impl CustomRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
