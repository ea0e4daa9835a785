//! Live-state fetcher: builds the "what GitHub currently has" model.
//!
//! Organization-scope resources come first (settings, hooks, secrets,
//! variables, rulesets, teams, roles), then repository details are fetched
//! concurrently under a bounded fan-out, since repositories do not depend on each
//! other. The web channel, when enabled, holds the single authenticated
//! session and is therefore strictly serial.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use config_model::schema::{schema_for, ResourceKind};
use config_model::{
    CustomRole, OrganizationConfig, OrganizationSettings, RepositoryConfig, SecretConfig,
    TeamConfig, VariableConfig, ORGANIZATION_WEB_SETTINGS, REDACTED_VALUE,
};
use github_client::GitHubClient;

use crate::errors::{EngineError, EngineResult};
use crate::mapping::{
    bpr_from_node, environment_from_wire, repository_from_wire, ruleset_from_wire, webhook_from_wire,
    ActorDirectory,
};

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;

/// Fetch behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Read web-only fields through the web channel. When off, those fields
    /// stay unset and the diff excludes them entirely.
    pub include_web: bool,
    /// Concurrent repository detail fetches.
    pub repo_concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_web: true,
            repo_concurrency: 8,
        }
    }
}

/// Populates an [`OrganizationConfig`] from GitHub's current state.
pub struct LiveStateFetcher {
    client: Arc<GitHubClient>,
    options: FetchOptions,
}

impl LiveStateFetcher {
    pub fn new(client: Arc<GitHubClient>, options: FetchOptions) -> Self {
        Self { client, options }
    }

    /// Fetches the complete live configuration of one organization.
    #[instrument(skip(self), fields(org = %org))]
    pub async fn fetch_organization(&self, org: &str) -> EngineResult<OrganizationConfig> {
        info!(org = org, "Fetching live organization state");
        let rest = self.client.rest();

        let mut config = OrganizationConfig::new(org);
        config.settings = self.fetch_org_settings(org).await?;

        config.webhooks = rest
            .get_all(&format!("/orgs/{org}/hooks"))
            .await?
            .iter()
            .filter_map(webhook_from_wire)
            .collect();

        config.secrets = self.fetch_org_secrets(org).await?;
        config.variables = self.fetch_org_variables(org).await?;

        let (teams, directory) = self.fetch_teams_and_directory(org).await?;
        config.teams = teams;

        config.roles = rest
            .get_all_wrapped(
                &format!("/orgs/{org}/custom-repository-roles"),
                "custom_roles",
            )
            .await?
            .iter()
            .filter_map(role_from_wire)
            .collect();

        config.rulesets =
            fetch_rulesets(&self.client, &format!("/orgs/{org}/rulesets"), &directory).await?;

        config.repositories = self.fetch_repositories(org, Arc::new(directory)).await?;

        info!(
            org = org,
            repositories = config.repositories.len(),
            teams = config.teams.len(),
            "Live state assembled"
        );
        Ok(config)
    }

    async fn fetch_org_settings(&self, org: &str) -> EngineResult<OrganizationSettings> {
        let schema = schema_for(ResourceKind::Organization);
        let raw = self.client.rest().get(&format!("/orgs/{org}")).await?;
        let mut projected = schema.project(&raw);

        if self.options.include_web {
            if let Some(web) = self.client.web() {
                let session = web.login(org).await?;
                if let Some(object) = projected.as_object_mut() {
                    for setting in ORGANIZATION_WEB_SETTINGS {
                        match session.read_setting(setting).await {
                            Ok(value) => {
                                object.insert(setting.field.to_string(), value);
                            }
                            Err(e) if e.is_soft() => {
                                warn!(
                                    field = setting.field,
                                    error = %e,
                                    "Skipping web setting; page structure not recognized"
                                );
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                session.close().await?;
            }
        }

        serde_json::from_value(projected)
            .map_err(|e| EngineError::Payload(format!("organization settings: {e}")))
    }

    async fn fetch_org_secrets(&self, org: &str) -> EngineResult<Vec<SecretConfig>> {
        let rest = self.client.rest();
        let wires = rest
            .get_all_wrapped(&format!("/orgs/{org}/actions/secrets"), "secrets")
            .await?;
        let mut secrets = Vec::with_capacity(wires.len());
        for wire in wires {
            let Some(name) = wire.get("name").and_then(Value::as_str) else {
                continue;
            };
            let visibility = wire
                .get("visibility")
                .and_then(Value::as_str)
                .map(str::to_string);
            let selected_repositories = if visibility.as_deref() == Some("selected") {
                rest.get_all_wrapped(
                    &format!("/orgs/{org}/actions/secrets/{name}/repositories"),
                    "repositories",
                )
                .await?
                .iter()
                .filter_map(|repo| repo.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
            } else {
                Vec::new()
            };
            secrets.push(SecretConfig {
                name: name.to_string(),
                // The true value is unknowable once stored.
                value: Some(REDACTED_VALUE.to_string()),
                visibility,
                selected_repositories,
            });
        }
        Ok(secrets)
    }

    async fn fetch_org_variables(&self, org: &str) -> EngineResult<Vec<VariableConfig>> {
        let wires = self
            .client
            .rest()
            .get_all_wrapped(&format!("/orgs/{org}/actions/variables"), "variables")
            .await?;
        Ok(wires
            .iter()
            .filter_map(|wire| {
                Some(VariableConfig {
                    name: wire.get("name")?.as_str()?.to_string(),
                    value: wire
                        .get("value")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    visibility: wire
                        .get("visibility")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    selected_repositories: Vec::new(),
                })
            })
            .collect())
    }

    /// Fetches teams plus the id directory needed to resolve ruleset bypass
    /// actors and GitHub App references.
    async fn fetch_teams_and_directory(
        &self,
        org: &str,
    ) -> EngineResult<(Vec<TeamConfig>, ActorDirectory)> {
        let rest = self.client.rest();
        let mut directory = ActorDirectory {
            org: org.to_string(),
            ..ActorDirectory::default()
        };

        let mut teams = Vec::new();
        for wire in rest.get_all(&format!("/orgs/{org}/teams")).await? {
            let Some(name) = wire.get("name").and_then(Value::as_str) else {
                continue;
            };
            let Some(slug) = wire.get("slug").and_then(Value::as_str) else {
                continue;
            };
            if let Some(id) = wire.get("id").and_then(Value::as_u64) {
                directory.teams_by_id.insert(id, slug.to_string());
            }

            let members = self.fetch_team_logins(org, slug, "member").await?;
            let maintainers = self.fetch_team_logins(org, slug, "maintainer").await?;
            teams.push(TeamConfig {
                name: name.to_string(),
                description: wire
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                privacy: wire
                    .get("privacy")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                notification_setting: wire
                    .get("notification_setting")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                members,
                maintainers,
            });
        }

        for wire in rest
            .get_all_wrapped(&format!("/orgs/{org}/installations"), "installations")
            .await?
        {
            if let (Some(app_id), Some(app_slug)) = (
                wire.get("app_id").and_then(Value::as_u64),
                wire.get("app_slug").and_then(Value::as_str),
            ) {
                directory.apps_by_id.insert(app_id, app_slug.to_string());
            }
        }

        Ok((teams, directory))
    }

    async fn fetch_team_logins(
        &self,
        org: &str,
        slug: &str,
        role: &str,
    ) -> EngineResult<Vec<String>> {
        let members = self
            .client
            .rest()
            .get_all(&format!("/orgs/{org}/teams/{slug}/members?role={role}"))
            .await?;
        Ok(members
            .iter()
            .filter_map(|member| member.get("login").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Fetches every repository's details under a bounded fan-out.
    async fn fetch_repositories(
        &self,
        org: &str,
        directory: Arc<ActorDirectory>,
    ) -> EngineResult<Vec<RepositoryConfig>> {
        let names: Vec<String> = self
            .client
            .rest()
            .get_all(&format!("/orgs/{org}/repos"))
            .await?
            .iter()
            .filter_map(|repo| repo.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        debug!(org = org, count = names.len(), "Fetching repository details");

        let semaphore = Arc::new(Semaphore::new(self.options.repo_concurrency.max(1)));
        let mut join_set = JoinSet::new();
        for name in names {
            let client = self.client.clone();
            let directory = directory.clone();
            let semaphore = semaphore.clone();
            let org = org.to_string();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                fetch_repository(client, &org, &name, &directory).await
            });
        }

        let mut repositories = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let repo = joined
                .map_err(|e| EngineError::Payload(format!("repository fetch task failed: {e}")))??;
            repositories.push(repo);
        }
        // Fan-out completes in arbitrary order; keep the model stable.
        repositories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repositories)
    }
}

/// Fetches one repository with everything nested beneath it.
async fn fetch_repository(
    client: Arc<GitHubClient>,
    org: &str,
    name: &str,
    directory: &ActorDirectory,
) -> EngineResult<RepositoryConfig> {
    let rest = client.rest();
    let base = format!("/repos/{org}/{name}");

    let raw = rest.get(&base).await?;
    let mut repo = repository_from_wire(&raw)?;

    match rest.get(&format!("{base}/automated-security-fixes")).await {
        Ok(value) => {
            repo.dependabot_security_updates_enabled =
                value.get("enabled").and_then(Value::as_bool);
        }
        Err(github_client::Error::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    match rest
        .get(&format!("{base}/private-vulnerability-reporting"))
        .await
    {
        Ok(value) => {
            repo.private_vulnerability_reporting_enabled =
                value.get("enabled").and_then(Value::as_bool);
        }
        Err(github_client::Error::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    for node in client.graphql().branch_protection_rules(org, name).await? {
        repo.branch_protection_rules.push(bpr_from_node(&node)?);
    }

    repo.rulesets = fetch_rulesets(&client, &format!("{base}/rulesets"), directory).await?;

    repo.webhooks = rest
        .get_all(&format!("{base}/hooks"))
        .await?
        .iter()
        .filter_map(webhook_from_wire)
        .collect();

    repo.secrets = rest
        .get_all_wrapped(&format!("{base}/actions/secrets"), "secrets")
        .await?
        .iter()
        .filter_map(|wire| {
            Some(SecretConfig {
                name: wire.get("name")?.as_str()?.to_string(),
                value: Some(REDACTED_VALUE.to_string()),
                visibility: None,
                selected_repositories: Vec::new(),
            })
        })
        .collect();

    repo.variables = rest
        .get_all_wrapped(&format!("{base}/actions/variables"), "variables")
        .await?
        .iter()
        .filter_map(|wire| {
            Some(VariableConfig {
                name: wire.get("name")?.as_str()?.to_string(),
                value: wire
                    .get("value")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                visibility: None,
                selected_repositories: Vec::new(),
            })
        })
        .collect();

    for wire in rest
        .get_all_wrapped(&format!("{base}/environments"), "environments")
        .await?
    {
        let Some(env_name) = wire.get("name").and_then(Value::as_str) else {
            continue;
        };
        let custom_policy = wire
            .pointer("/deployment_branch_policy/custom_branch_policies")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let policies = if custom_policy {
            rest.get_all_wrapped(
                &format!("{base}/environments/{env_name}/deployment-branch-policies"),
                "branch_policies",
            )
            .await?
            .iter()
            .filter_map(|policy| policy.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
        } else {
            Vec::new()
        };
        repo.environments
            .push(environment_from_wire(&wire, policies, org)?);
    }

    Ok(repo)
}

/// Fetches rulesets at either scope: the listing carries ids, the detail
/// endpoint carries conditions, rules and bypass actors.
async fn fetch_rulesets(
    client: &GitHubClient,
    base_path: &str,
    directory: &ActorDirectory,
) -> EngineResult<Vec<config_model::RulesetConfig>> {
    let rest = client.rest();
    let mut rulesets = Vec::new();
    for listed in rest.get_all(base_path).await? {
        let Some(id) = listed.get("id").and_then(Value::as_u64) else {
            continue;
        };
        let detail = rest.get(&format!("{base_path}/{id}")).await?;
        rulesets.push(ruleset_from_wire(&detail, directory)?);
    }
    Ok(rulesets)
}

fn role_from_wire(wire: &Value) -> Option<CustomRole> {
    Some(CustomRole {
        name: wire.get("name")?.as_str()?.to_string(),
        description: wire
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        base_role: wire
            .get("base_role")
            .and_then(Value::as_str)
            .map(str::to_string),
        permissions: wire
            .get("permissions")
            .and_then(Value::as_array)
            .map(|permissions| {
                permissions
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}
