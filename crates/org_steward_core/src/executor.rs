//! Plan executor: turns a computed plan into ordered GitHub mutations.
//!
//! The walk respects structural dependency: a repository is created before
//! the rules, hooks and environments that reference it; organization-scope
//! entries have no cross-entity dependency among themselves. Independent
//! repositories apply concurrently under a bounded worker pool; web-channel
//! writes stay on the single authenticated session. Every entry's outcome is
//! recorded independently: one failing entity never halts its siblings,
//! while a failing parent short-circuits its already-queued children.
//!
//! Cancellation is cooperative: the flag is checked between plan entries,
//! and an in-flight mutation is allowed to complete rather than being
//! hard-aborted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use config_model::bypass_actor::{repository_role_id, ActorKind, BypassActor, BypassScope};
use config_model::schema::{schema_for, ProviderTag, ResourceKind};
use config_model::{web_setting_for, CredentialResolver, WebhookConfig};
use github_client::GitHubClient;

use crate::errors::{EngineError, EngineResult};
use crate::mapping::{
    org_settings_rest_payload, ruleset_to_wire, webhook_to_wire, BPR_ACTOR_FIELDS, BPR_FIELD_MAP,
};
use crate::plan::{ChangeAction, FieldDelta, Plan, ResourceChange};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// Executor behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Concurrent top-level repository applications.
    pub apply_concurrency: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            apply_concurrency: 4,
        }
    }
}

/// Result of one plan entry.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Applied,
    Noop,
    /// Deletion was computed but not enabled.
    WouldDelete,
    /// The parent entity failed, so this entry was never attempted.
    SkippedDependency,
    /// The run was cancelled before this entry started.
    SkippedCancelled,
    Failed(String),
}

/// Outcome of one entity, recorded independently of its siblings.
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    pub kind: ResourceKind,
    pub identity: String,
    pub action: ChangeAction,
    pub status: OutcomeStatus,
    /// Per-field warnings (web selector failures and similar soft errors).
    pub warnings: Vec<String>,
}

/// Overall classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    PartialFailure,
    Failure,
}

/// Full outcome report: per-entity status plus the aggregate class.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub organization: String,
    pub outcomes: Vec<EntityOutcome>,
}

impl ExecutionReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, OutcomeStatus::Failed(_)))
            .count()
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Applied)
            .count()
    }

    pub fn classification(&self) -> RunOutcome {
        let failed = self.failed_count();
        if failed == 0 {
            RunOutcome::Success
        } else if self.applied_count() > 0 {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Failure
        }
    }

    /// Enumerates every attempted entity with its outcome.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("organization {}:\n", self.organization));
        for outcome in &self.outcomes {
            if outcome.status == OutcomeStatus::Noop {
                continue;
            }
            let status = match &outcome.status {
                OutcomeStatus::Applied => "applied".to_string(),
                OutcomeStatus::Noop => unreachable!(),
                OutcomeStatus::WouldDelete => {
                    "would delete (enable with --delete-resources)".to_string()
                }
                OutcomeStatus::SkippedDependency => "skipped (parent failed)".to_string(),
                OutcomeStatus::SkippedCancelled => "skipped (cancelled)".to_string(),
                OutcomeStatus::Failed(reason) => format!("failed: {reason}"),
            };
            out.push_str(&format!(
                "  {} {}[{}]: {}\n",
                outcome.action.symbol(),
                outcome.kind.display(),
                outcome.identity,
                status
            ));
            for warning in &outcome.warnings {
                out.push_str(&format!("      warning: {warning}\n"));
            }
        }
        out.push_str(&format!(
            "\n{} applied, {} failed\n",
            self.applied_count(),
            self.failed_count()
        ));
        out
    }
}

/// Scope a mutation applies to.
#[derive(Debug, Clone)]
enum Scope {
    Org,
    Repo(String),
}

impl Scope {
    fn base_path(&self, org: &str) -> String {
        match self {
            Scope::Org => format!("/orgs/{org}"),
            Scope::Repo(repo) => format!("/repos/{org}/{repo}"),
        }
    }
}

/// Walks a plan in dependency order and issues the mutations.
pub struct Executor {
    client: Arc<GitHubClient>,
    resolver: Arc<CredentialResolver>,
    options: ExecutorOptions,
    cancel: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(
        client: Arc<GitHubClient>,
        resolver: Arc<CredentialResolver>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            client,
            resolver,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cooperative cancellation: setting the flag stops the run
    /// between entities; in-flight mutations complete.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Applies one plan and reports every entity's outcome.
    #[instrument(skip(self, plan), fields(org = %plan.organization))]
    pub async fn apply(&self, plan: &Plan) -> ExecutionReport {
        info!(
            org = %plan.organization,
            entries = plan.changes.len(),
            "Applying plan"
        );
        let org = plan.organization.clone();
        let mut outcomes = Vec::new();

        let (repo_changes, org_changes): (Vec<&ResourceChange>, Vec<&ResourceChange>) = plan
            .changes
            .iter()
            .partition(|change| change.kind == ResourceKind::Repository);

        // Organization-scope entries run serially: few of them, and the web
        // channel must never be used concurrently.
        for change in org_changes {
            if self.cancel.load(Ordering::Relaxed) {
                outcomes.push(skipped_cancelled(change));
                continue;
            }
            outcomes.push(self.apply_entry(&org, &Scope::Org, change).await);
        }

        // Independent repositories fan out under the worker pool; each
        // repository's own subtree stays strictly sequential.
        let semaphore = Arc::new(Semaphore::new(self.options.apply_concurrency.max(1)));
        let mut join_set: JoinSet<Vec<EntityOutcome>> = JoinSet::new();
        for change in repo_changes {
            if self.cancel.load(Ordering::Relaxed) {
                outcomes.push(skipped_cancelled(change));
                outcomes.extend(
                    change
                        .children
                        .iter()
                        .filter(|child| !child.is_noop_tree())
                        .map(skipped_cancelled),
                );
                continue;
            }
            let worker = RepositoryWorker {
                client: self.client.clone(),
                resolver: self.resolver.clone(),
                org: org.clone(),
                cancel: self.cancel.clone(),
            };
            let change = change.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                worker.apply_repository(&change).await
            });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(mut repo_outcomes) => outcomes.append(&mut repo_outcomes),
                Err(e) => warn!(error = %e, "Repository apply task failed to join"),
            }
        }

        let report = ExecutionReport {
            organization: org,
            outcomes,
        };
        info!(
            applied = report.applied_count(),
            failed = report.failed_count(),
            "Plan application finished"
        );
        report
    }

    async fn apply_entry(
        &self,
        org: &str,
        scope: &Scope,
        change: &ResourceChange,
    ) -> EntityOutcome {
        let worker = RepositoryWorker {
            client: self.client.clone(),
            resolver: self.resolver.clone(),
            org: org.to_string(),
            cancel: self.cancel.clone(),
        };
        worker.apply_single(scope, change).await
    }
}

fn skipped_cancelled(change: &ResourceChange) -> EntityOutcome {
    EntityOutcome {
        kind: change.kind,
        identity: change.identity.clone(),
        action: change.action,
        status: OutcomeStatus::SkippedCancelled,
        warnings: Vec::new(),
    }
}

fn skipped_dependency(change: &ResourceChange) -> EntityOutcome {
    EntityOutcome {
        kind: change.kind,
        identity: change.identity.clone(),
        action: change.action,
        status: OutcomeStatus::SkippedDependency,
        warnings: Vec::new(),
    }
}

/// Per-task application context. Cheap to clone into spawned workers.
struct RepositoryWorker {
    client: Arc<GitHubClient>,
    resolver: Arc<CredentialResolver>,
    org: String,
    cancel: Arc<AtomicBool>,
}

impl RepositoryWorker {
    /// Applies a repository node and then its children, short-circuiting the
    /// children when the parent fails.
    async fn apply_repository(&self, change: &ResourceChange) -> Vec<EntityOutcome> {
        let mut outcomes = Vec::new();
        let parent = self.apply_single(&Scope::Org, change).await;
        let parent_failed = matches!(parent.status, OutcomeStatus::Failed(_));
        outcomes.push(parent);

        let scope = Scope::Repo(change.identity.clone());
        for child in &change.children {
            if child.is_noop_tree() {
                continue;
            }
            if parent_failed {
                outcomes.push(skipped_dependency(child));
                continue;
            }
            if self.cancel.load(Ordering::Relaxed) {
                outcomes.push(skipped_cancelled(child));
                continue;
            }
            outcomes.push(self.apply_single(&scope, child).await);
        }
        outcomes
    }

    /// Applies one plan entry.
    async fn apply_single(&self, scope: &Scope, change: &ResourceChange) -> EntityOutcome {
        let mut warnings = Vec::new();
        let status = match change.action {
            ChangeAction::Noop => OutcomeStatus::Noop,
            ChangeAction::Delete if !change.actionable => OutcomeStatus::WouldDelete,
            _ => match self.mutate(scope, change, &mut warnings).await {
                Ok(()) => OutcomeStatus::Applied,
                Err(e) => OutcomeStatus::Failed(e.to_string()),
            },
        };
        if let OutcomeStatus::Failed(reason) = &status {
            warn!(
                kind = change.kind.display(),
                identity = %change.identity,
                reason = %reason,
                "Plan entry failed"
            );
        }
        EntityOutcome {
            kind: change.kind,
            identity: change.identity.clone(),
            action: change.action,
            status,
            warnings,
        }
    }

    async fn mutate(
        &self,
        scope: &Scope,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        match change.kind {
            ResourceKind::Organization => self.apply_org_settings(change, warnings).await,
            ResourceKind::Repository => self.apply_repository_entity(change).await,
            ResourceKind::Webhook => self.apply_webhook(scope, change).await,
            ResourceKind::Secret => self.apply_secret(scope, change, warnings).await,
            ResourceKind::Variable => self.apply_variable(scope, change).await,
            ResourceKind::Ruleset => self.apply_ruleset(scope, change, warnings).await,
            ResourceKind::Team => self.apply_team(change).await,
            ResourceKind::Role => self.apply_role(change).await,
            ResourceKind::BranchProtectionRule => {
                self.apply_branch_protection(scope, change, warnings).await
            }
            ResourceKind::Environment => self.apply_environment(scope, change, warnings).await,
        }
    }

    // -- organization settings --------------------------------------------

    /// Organization settings update. The REST side always sends the complete
    /// managed payload; web-sourced deltas go through the web session one
    /// field at a time, each degrading to a warning on selector failures.
    async fn apply_org_settings(
        &self,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let schema = schema_for(ResourceKind::Organization);
        let desired = change
            .desired
            .as_ref()
            .ok_or_else(|| EngineError::Payload("organization change without snapshot".into()))?;

        let has_rest_delta = change.deltas.iter().any(|delta| {
            schema
                .field(&delta.field)
                .is_some_and(|field| field.provider == ProviderTag::Rest)
        });
        if has_rest_delta {
            let payload = org_settings_rest_payload(desired);
            self.client
                .rest()
                .patch(&format!("/orgs/{}", self.org), &payload)
                .await?;
        }

        let web_deltas: Vec<&FieldDelta> = change
            .deltas
            .iter()
            .filter(|delta| {
                schema
                    .field(&delta.field)
                    .is_some_and(|field| field.provider == ProviderTag::Web)
            })
            .collect();
        if web_deltas.is_empty() {
            return Ok(());
        }

        let Some(web) = self.client.web() else {
            warnings.push("web channel unavailable; web-sourced fields skipped".to_string());
            return Ok(());
        };
        let session = web.login(&self.org).await?;
        for delta in web_deltas {
            let Some(setting) = web_setting_for(&delta.field) else {
                warnings.push(format!("no web descriptor for '{}'", delta.field));
                continue;
            };
            match session.write_setting(setting, &delta.to).await {
                Ok(()) => {}
                Err(e) if e.is_soft() => {
                    warnings.push(format!("{}: {e}", delta.field));
                }
                Err(e) => {
                    session.close().await.ok();
                    return Err(e.into());
                }
            }
        }
        session.close().await?;
        Ok(())
    }

    // -- repositories ------------------------------------------------------

    async fn apply_repository_entity(&self, change: &ResourceChange) -> EngineResult<()> {
        let rest = self.client.rest();
        match change.action {
            ChangeAction::Create => {
                let desired = snapshot(change)?;
                let payload = repository_rest_payload(desired, None);
                rest.post(&format!("/orgs/{}/repos", self.org), &payload)
                    .await?;
                self.apply_repository_side_channels(&change.identity, desired, None)
                    .await
            }
            ChangeAction::Update | ChangeAction::ForcedUpdate => {
                let desired = snapshot(change)?;
                let target = change.target_identity();
                let payload = repository_rest_payload(desired, Some(&change.deltas));
                if payload.as_object().is_some_and(|map| !map.is_empty()) {
                    rest.patch(&format!("/repos/{}/{}", self.org, target), &payload)
                        .await?;
                }
                self.apply_repository_side_channels(&change.identity, desired, Some(&change.deltas))
                    .await
            }
            ChangeAction::Delete => {
                rest.delete(&format!("/repos/{}/{}", self.org, change.identity))
                    .await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    /// Repository settings living outside the main PATCH payload.
    async fn apply_repository_side_channels(
        &self,
        repo: &str,
        desired: &Value,
        deltas: Option<&[FieldDelta]>,
    ) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = format!("/repos/{}/{repo}", self.org);
        let changed = |field: &str| match deltas {
            Some(deltas) => deltas.iter().any(|d| d.field == field),
            None => true,
        };

        if changed("topics") {
            if let Some(topics) = desired.get("topics").and_then(Value::as_array) {
                if deltas.is_some() || !topics.is_empty() {
                    rest.put(&format!("{base}/topics"), Some(&json!({ "names": topics })))
                        .await?;
                }
            }
        }
        if changed("dependabot_security_updates_enabled") {
            if let Some(enabled) = desired
                .get("dependabot_security_updates_enabled")
                .and_then(Value::as_bool)
            {
                let path = format!("{base}/automated-security-fixes");
                if enabled {
                    rest.put(&path, None).await?;
                } else {
                    rest.delete(&path).await?;
                }
            }
        }
        if changed("private_vulnerability_reporting_enabled") {
            if let Some(enabled) = desired
                .get("private_vulnerability_reporting_enabled")
                .and_then(Value::as_bool)
            {
                let path = format!("{base}/private-vulnerability-reporting");
                if enabled {
                    rest.put(&path, None).await?;
                } else {
                    rest.delete(&path).await?;
                }
            }
        }
        Ok(())
    }

    // -- webhooks ----------------------------------------------------------

    async fn apply_webhook(&self, scope: &Scope, change: &ResourceChange) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = scope.base_path(&self.org);
        match change.action {
            ChangeAction::Create => {
                let payload = self.webhook_payload(change).await?;
                rest.post(&format!("{base}/hooks"), &payload).await?;
                Ok(())
            }
            ChangeAction::Update => {
                let id = self.find_webhook_id(&base, change.target_identity()).await?;
                let payload = self.webhook_payload(change).await?;
                rest.patch(&format!("{base}/hooks/{id}"), &payload).await?;
                Ok(())
            }
            ChangeAction::ForcedUpdate => {
                // Replace: delete the old hook first; only create once the
                // delete succeeded, so a failure cannot leave both behind.
                let id = self.find_webhook_id(&base, change.target_identity()).await?;
                rest.delete(&format!("{base}/hooks/{id}")).await?;
                let payload = self.webhook_payload(change).await?;
                rest.post(&format!("{base}/hooks"), &payload).await?;
                Ok(())
            }
            ChangeAction::Delete => {
                let id = self.find_webhook_id(&base, &change.identity).await?;
                rest.delete(&format!("{base}/hooks/{id}")).await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    async fn webhook_payload(&self, change: &ResourceChange) -> EngineResult<Value> {
        let hook: WebhookConfig = serde_json::from_value(snapshot(change)?.clone())
            .map_err(|e| EngineError::Payload(format!("webhook snapshot: {e}")))?;
        let resolved = match &hook.secret {
            Some(reference) => Some(self.resolver.resolve(reference).await?),
            None => None,
        };
        Ok(webhook_to_wire(&hook, resolved.as_deref()))
    }

    async fn find_webhook_id(&self, base: &str, url: &str) -> EngineResult<u64> {
        let hooks = self.client.rest().get_all(&format!("{base}/hooks")).await?;
        hooks
            .iter()
            .find(|hook| {
                hook.pointer("/config/url").and_then(Value::as_str) == Some(url)
            })
            .and_then(|hook| hook.get("id").and_then(Value::as_u64))
            .ok_or_else(|| EngineError::Payload(format!("no live webhook with url '{url}'")))
    }

    // -- secrets and variables --------------------------------------------

    async fn apply_secret(
        &self,
        scope: &Scope,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = scope.base_path(&self.org);
        let path = format!("{base}/actions/secrets/{}", change.target_identity());
        if change.action == ChangeAction::Delete {
            rest.delete(&path).await?;
            return Ok(());
        }

        let desired = snapshot(change)?;
        let Some(reference) = desired.get("value").and_then(Value::as_str) else {
            warnings.push(format!(
                "secret '{}' has no value to write; skipped",
                change.identity
            ));
            return Ok(());
        };
        if config_model::is_redacted(reference) {
            warnings.push(format!(
                "secret '{}' only carries the redaction marker; skipped",
                change.identity
            ));
            return Ok(());
        }
        let value = self.resolver.resolve(reference).await?;

        let key = match scope {
            Scope::Org => self.client.org_actions_public_key(&self.org).await?,
            Scope::Repo(repo) => {
                self.client
                    .repo_actions_public_key(&self.org, repo)
                    .await?
            }
        };
        let mut payload = Map::new();
        payload.insert("encrypted_value".to_string(), json!(key.seal(&value)?));
        payload.insert("key_id".to_string(), json!(key.key_id));
        if matches!(scope, Scope::Org) {
            let visibility = desired
                .get("visibility")
                .and_then(Value::as_str)
                .unwrap_or("all");
            payload.insert("visibility".to_string(), json!(visibility));
            if visibility == "selected" {
                let ids = self
                    .repository_ids(desired.get("selected_repositories"))
                    .await?;
                payload.insert("selected_repository_ids".to_string(), json!(ids));
            }
        }
        rest.put(&path, Some(&Value::Object(payload))).await?;
        Ok(())
    }

    async fn repository_ids(&self, names: Option<&Value>) -> EngineResult<Vec<u64>> {
        let mut ids = Vec::new();
        for name in names
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            let repo = self
                .client
                .rest()
                .get(&format!("/repos/{}/{name}", self.org))
                .await?;
            if let Some(id) = repo.get("id").and_then(Value::as_u64) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn apply_variable(&self, scope: &Scope, change: &ResourceChange) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = scope.base_path(&self.org);
        match change.action {
            ChangeAction::Create => {
                let desired = snapshot(change)?;
                rest.post(&format!("{base}/actions/variables"), desired)
                    .await?;
                Ok(())
            }
            ChangeAction::Update | ChangeAction::ForcedUpdate => {
                let desired = snapshot(change)?;
                rest.patch(
                    &format!("{base}/actions/variables/{}", change.target_identity()),
                    desired,
                )
                .await?;
                Ok(())
            }
            ChangeAction::Delete => {
                rest.delete(&format!("{base}/actions/variables/{}", change.identity))
                    .await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    // -- rulesets ----------------------------------------------------------

    async fn apply_ruleset(
        &self,
        scope: &Scope,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = format!("{}/rulesets", scope.base_path(&self.org));
        match change.action {
            ChangeAction::Create => {
                let payload = self.ruleset_payload(change, warnings).await?;
                rest.post(&base, &payload).await?;
                Ok(())
            }
            ChangeAction::Update => {
                let id = self.find_ruleset_id(&base, change.target_identity()).await?;
                let payload = self.ruleset_payload(change, warnings).await?;
                rest.put(&format!("{base}/{id}"), Some(&payload)).await?;
                Ok(())
            }
            ChangeAction::ForcedUpdate => {
                let id = self.find_ruleset_id(&base, change.target_identity()).await?;
                rest.delete(&format!("{base}/{id}")).await?;
                let payload = self.ruleset_payload(change, warnings).await?;
                rest.post(&base, &payload).await?;
                Ok(())
            }
            ChangeAction::Delete => {
                let id = self.find_ruleset_id(&base, &change.identity).await?;
                rest.delete(&format!("{base}/{id}")).await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    async fn ruleset_payload(
        &self,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<Value> {
        let ruleset: config_model::RulesetConfig =
            serde_json::from_value(snapshot(change)?.clone())
                .map_err(|e| EngineError::Payload(format!("ruleset snapshot: {e}")))?;
        let mut actors = Vec::new();
        for raw in &ruleset.bypass_actors {
            match self.resolve_ruleset_actor(raw).await {
                Ok(Some(actor)) => actors.push(actor),
                Ok(None) => warnings.push(format!("bypass actor '{raw}' not representable")),
                Err(e) => return Err(e),
            }
        }
        Ok(ruleset_to_wire(&ruleset, actors))
    }

    /// Resolves a bypass-actor string to the numeric REST shape.
    async fn resolve_ruleset_actor(&self, raw: &str) -> EngineResult<Option<Value>> {
        let actor = BypassActor::parse(raw)?;
        let bypass_mode = match actor.scope {
            Some(BypassScope::PullRequest) => "pull_request",
            _ => "always",
        };
        let resolved = match &actor.kind {
            ActorKind::Role(role) if role == "organization_admin" => Some(json!({
                "actor_id": 1,
                "actor_type": "OrganizationAdmin",
                "bypass_mode": bypass_mode,
            })),
            ActorKind::Role(role) => repository_role_id(role).map(|id| {
                json!({
                    "actor_id": id,
                    "actor_type": "RepositoryRole",
                    "bypass_mode": bypass_mode,
                })
            }),
            ActorKind::Team { org, slug } => {
                let team = self
                    .client
                    .rest()
                    .get(&format!("/orgs/{org}/teams/{slug}"))
                    .await?;
                team.get("id").and_then(Value::as_u64).map(|id| {
                    json!({
                        "actor_id": id,
                        "actor_type": "Team",
                        "bypass_mode": bypass_mode,
                    })
                })
            }
            ActorKind::App(slug) => {
                let app = self.client.rest().get(&format!("/apps/{slug}")).await?;
                app.get("id").and_then(Value::as_u64).map(|id| {
                    json!({
                        "actor_id": id,
                        "actor_type": "Integration",
                        "bypass_mode": bypass_mode,
                    })
                })
            }
            // Rulesets have no user-level bypass on the wire.
            ActorKind::User(_) => None,
        };
        Ok(resolved)
    }

    async fn find_ruleset_id(&self, base: &str, name: &str) -> EngineResult<u64> {
        let rulesets = self.client.rest().get_all(base).await?;
        rulesets
            .iter()
            .find(|ruleset| ruleset.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|ruleset| ruleset.get("id").and_then(Value::as_u64))
            .ok_or_else(|| EngineError::Payload(format!("no live ruleset named '{name}'")))
    }

    // -- teams and roles ---------------------------------------------------

    async fn apply_team(&self, change: &ResourceChange) -> EngineResult<()> {
        let rest = self.client.rest();
        let org = &self.org;
        match change.action {
            ChangeAction::Create => {
                let desired = snapshot(change)?;
                let mut payload = scalar_subset(
                    desired,
                    &["name", "description", "privacy", "notification_setting"],
                );
                payload.insert(
                    "maintainers".to_string(),
                    desired.get("maintainers").cloned().unwrap_or(json!([])),
                );
                let created = rest
                    .post(&format!("/orgs/{org}/teams"), &Value::Object(payload))
                    .await?;
                let slug = created
                    .get("slug")
                    .and_then(Value::as_str)
                    .ok_or_else(|| EngineError::Payload("team create returned no slug".into()))?;
                for login in desired
                    .get("members")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                {
                    rest.put(
                        &format!("/orgs/{org}/teams/{slug}/memberships/{login}"),
                        Some(&json!({ "role": "member" })),
                    )
                    .await?;
                }
                Ok(())
            }
            ChangeAction::Update | ChangeAction::ForcedUpdate => {
                let slug = self.find_team_slug(change.target_identity()).await?;
                let scalar_changed: Map<String, Value> = change
                    .deltas
                    .iter()
                    .filter(|delta| {
                        ["name", "description", "privacy", "notification_setting"]
                            .contains(&delta.field.as_str())
                    })
                    .map(|delta| (delta.field.clone(), delta.to.clone()))
                    .collect();
                if !scalar_changed.is_empty() {
                    rest.patch(
                        &format!("/orgs/{org}/teams/{slug}"),
                        &Value::Object(scalar_changed),
                    )
                    .await?;
                }
                for (field, role) in [("members", "member"), ("maintainers", "maintainer")] {
                    let Some(delta) = change.deltas.iter().find(|d| d.field == field) else {
                        continue;
                    };
                    let before = string_set(&delta.from);
                    let after = string_set(&delta.to);
                    for login in after.difference(&before) {
                        rest.put(
                            &format!("/orgs/{org}/teams/{slug}/memberships/{login}"),
                            Some(&json!({ "role": role })),
                        )
                        .await?;
                    }
                    for login in before.difference(&after) {
                        rest.delete(&format!("/orgs/{org}/teams/{slug}/memberships/{login}"))
                            .await?;
                    }
                }
                Ok(())
            }
            ChangeAction::Delete => {
                let slug = self.find_team_slug(&change.identity).await?;
                rest.delete(&format!("/orgs/{org}/teams/{slug}")).await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    async fn find_team_slug(&self, name: &str) -> EngineResult<String> {
        let teams = self
            .client
            .rest()
            .get_all(&format!("/orgs/{}/teams", self.org))
            .await?;
        teams
            .iter()
            .find(|team| team.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|team| team.get("slug").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| EngineError::Payload(format!("no live team named '{name}'")))
    }

    async fn apply_role(&self, change: &ResourceChange) -> EngineResult<()> {
        let rest = self.client.rest();
        let base = format!("/orgs/{}/custom-repository-roles", self.org);
        match change.action {
            ChangeAction::Create => {
                rest.post(&base, snapshot(change)?).await?;
                Ok(())
            }
            ChangeAction::Update | ChangeAction::ForcedUpdate => {
                let id = self.find_role_id(&base, change.target_identity()).await?;
                rest.patch(&format!("{base}/{id}"), snapshot(change)?).await?;
                Ok(())
            }
            ChangeAction::Delete => {
                let id = self.find_role_id(&base, &change.identity).await?;
                rest.delete(&format!("{base}/{id}")).await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    async fn find_role_id(&self, base: &str, name: &str) -> EngineResult<u64> {
        let roles = self
            .client
            .rest()
            .get_all_wrapped(base, "custom_roles")
            .await?;
        roles
            .iter()
            .find(|role| role.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|role| role.get("id").and_then(Value::as_u64))
            .ok_or_else(|| EngineError::Payload(format!("no live role named '{name}'")))
    }

    // -- branch protection -------------------------------------------------

    async fn apply_branch_protection(
        &self,
        scope: &Scope,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let Scope::Repo(repo) = scope else {
            return Err(EngineError::Payload(
                "branch protection outside a repository scope".into(),
            ));
        };
        let graphql = self.client.graphql();
        match change.action {
            ChangeAction::Create => {
                let repository_id = graphql.repository_id(&self.org, repo).await?;
                let mut input = self.bpr_input(change, warnings, false).await?;
                input.insert("repositoryId".to_string(), json!(repository_id));
                input.insert(
                    "pattern".to_string(),
                    json!(change.identity),
                );
                graphql
                    .create_branch_protection_rule(Value::Object(input))
                    .await?;
                Ok(())
            }
            ChangeAction::Update | ChangeAction::ForcedUpdate => {
                let rule_id = self
                    .find_branch_protection_id(repo, change.target_identity())
                    .await?;
                let mut input = self.bpr_input(change, warnings, true).await?;
                input.insert("branchProtectionRuleId".to_string(), json!(rule_id));
                if change.identity != change.target_identity() {
                    input.insert("pattern".to_string(), json!(change.identity));
                }
                graphql
                    .update_branch_protection_rule(Value::Object(input))
                    .await?;
                Ok(())
            }
            ChangeAction::Delete => {
                let rule_id = self.find_branch_protection_id(repo, &change.identity).await?;
                graphql.delete_branch_protection_rule(&rule_id).await?;
                Ok(())
            }
            ChangeAction::Noop => Ok(()),
        }
    }

    /// Builds the mutation input: camelCase scalar fields plus resolved
    /// actor-id lists. For updates only changed fields are sent.
    async fn bpr_input(
        &self,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
        only_changed: bool,
    ) -> EngineResult<Map<String, Value>> {
        let desired = snapshot(change)?;
        let changed = |field: &str| {
            !only_changed || change.deltas.iter().any(|delta| delta.field == field)
        };

        let mut input = Map::new();
        for (model_field, graphql_field) in BPR_FIELD_MAP {
            if !changed(model_field) {
                continue;
            }
            if let Some(value) = desired.get(*model_field) {
                if !value.is_null() {
                    input.insert((*graphql_field).to_string(), value.clone());
                }
            }
        }
        for (model_field, _, id_field) in BPR_ACTOR_FIELDS {
            if !changed(model_field) {
                continue;
            }
            let Some(actors) = desired.get(*model_field).and_then(Value::as_array) else {
                continue;
            };
            let mut ids = Vec::new();
            for actor in actors.iter().filter_map(Value::as_str) {
                match self.resolve_graphql_actor(actor).await {
                    Ok(id) => ids.push(json!(id)),
                    Err(EngineError::Client(github_client::Error::NotFound(_))) => {
                        warnings.push(format!("allowance actor '{actor}' not found"));
                    }
                    Err(e) => return Err(e),
                }
            }
            input.insert((*id_field).to_string(), json!(ids));
        }
        Ok(input)
    }

    /// Resolves an allowance actor string to a GraphQL node id.
    async fn resolve_graphql_actor(&self, raw: &str) -> EngineResult<String> {
        let actor = BypassActor::parse(raw)?;
        match &actor.kind {
            ActorKind::Team { org, slug } => {
                Ok(self.client.graphql().team_id(org, slug).await?)
            }
            ActorKind::User(login) => Ok(self.client.graphql().user_id(login).await?),
            ActorKind::App(slug) => Ok(self.client.app_node_id(slug).await?),
            ActorKind::Role(role) => Err(EngineError::Payload(format!(
                "role actor '#{role}' is not valid in branch protection allowances"
            ))),
        }
    }

    async fn find_branch_protection_id(&self, repo: &str, pattern: &str) -> EngineResult<String> {
        let rules = self
            .client
            .graphql()
            .branch_protection_rules(&self.org, repo)
            .await?;
        rules
            .iter()
            .find(|rule| rule.get("pattern").and_then(Value::as_str) == Some(pattern))
            .and_then(|rule| rule.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| {
                EngineError::Payload(format!("no live branch protection rule for '{pattern}'"))
            })
    }

    // -- environments ------------------------------------------------------

    async fn apply_environment(
        &self,
        scope: &Scope,
        change: &ResourceChange,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let Scope::Repo(repo) = scope else {
            return Err(EngineError::Payload(
                "environment outside a repository scope".into(),
            ));
        };
        let rest = self.client.rest();
        let base = format!("/repos/{}/{repo}/environments", self.org);
        if change.action == ChangeAction::Delete {
            rest.delete(&format!("{base}/{}", change.identity)).await?;
            return Ok(());
        }

        let desired = snapshot(change)?;
        let mut payload = Map::new();
        if let Some(wait) = desired.get("wait_timer").and_then(Value::as_u64) {
            payload.insert("wait_timer".to_string(), json!(wait));
        }
        if let Some(prevent) = desired.get("prevent_self_review").and_then(Value::as_bool) {
            payload.insert("prevent_self_review".to_string(), json!(prevent));
        }
        let mut reviewers = Vec::new();
        for raw in desired
            .get("reviewers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            match self.resolve_environment_reviewer(raw).await? {
                Some(reviewer) => reviewers.push(reviewer),
                None => warnings.push(format!("reviewer '{raw}' not representable")),
            }
        }
        if !reviewers.is_empty() {
            payload.insert("reviewers".to_string(), json!(reviewers));
        }
        let policy = desired
            .get("deployment_branch_policy")
            .and_then(Value::as_str)
            .unwrap_or("all");
        payload.insert(
            "deployment_branch_policy".to_string(),
            match policy {
                "protected" => json!({
                    "protected_branches": true,
                    "custom_branch_policies": false,
                }),
                "custom" => json!({
                    "protected_branches": false,
                    "custom_branch_policies": true,
                }),
                _ => Value::Null,
            },
        );

        let name = &change.identity;
        rest.put(&format!("{base}/{name}"), Some(&Value::Object(payload)))
            .await?;

        if policy == "custom" {
            self.sync_branch_policies(&format!("{base}/{name}"), desired)
                .await?;
        }
        Ok(())
    }

    async fn resolve_environment_reviewer(&self, raw: &str) -> EngineResult<Option<Value>> {
        let actor = BypassActor::parse(raw)?;
        match &actor.kind {
            ActorKind::Team { org, slug } => {
                let team = self
                    .client
                    .rest()
                    .get(&format!("/orgs/{org}/teams/{slug}"))
                    .await?;
                Ok(team
                    .get("id")
                    .and_then(Value::as_u64)
                    .map(|id| json!({ "type": "Team", "id": id })))
            }
            ActorKind::User(login) => {
                let user = self.client.rest().get(&format!("/users/{login}")).await?;
                Ok(user
                    .get("id")
                    .and_then(Value::as_u64)
                    .map(|id| json!({ "type": "User", "id": id })))
            }
            _ => Ok(None),
        }
    }

    /// Aligns custom deployment branch policies with the desired patterns.
    async fn sync_branch_policies(&self, env_base: &str, desired: &Value) -> EngineResult<()> {
        let rest = self.client.rest();
        let wanted: Vec<&str> = desired
            .get("branch_policies")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .collect();

        let path = format!("{env_base}/deployment-branch-policies");
        let existing = rest.get_all_wrapped(&path, "branch_policies").await?;
        for policy in &existing {
            let name = policy.get("name").and_then(Value::as_str).unwrap_or_default();
            if !wanted.contains(&name) {
                if let Some(id) = policy.get("id").and_then(Value::as_u64) {
                    rest.delete(&format!("{path}/{id}")).await?;
                }
            }
        }
        let existing_names: Vec<&str> = existing
            .iter()
            .filter_map(|policy| policy.get("name").and_then(Value::as_str))
            .collect();
        for name in wanted {
            if !existing_names.contains(&name) {
                rest.post(&path, &json!({ "name": name })).await?;
            }
        }
        Ok(())
    }
}

/// The desired snapshot a mutating entry must carry.
fn snapshot(change: &ResourceChange) -> EngineResult<&Value> {
    change.desired.as_ref().ok_or_else(|| {
        EngineError::Payload(format!(
            "{}[{}] has no desired snapshot",
            change.kind.display(),
            change.identity
        ))
    })
}

/// Builds the repository REST payload: full for create, delta-only for
/// update (other resources send partial payloads).
fn repository_rest_payload(desired: &Value, deltas: Option<&[FieldDelta]>) -> Value {
    // Fields that are not part of the plain PATCH/POST repository payload.
    const SIDE_CHANNEL_FIELDS: &[&str] = &[
        "topics",
        "dependabot_security_updates_enabled",
        "private_vulnerability_reporting_enabled",
        "gh_pages_build_type",
        "gh_pages_source_branch",
        "gh_pages_source_path",
        "secret_scanning",
        "secret_scanning_push_protection",
    ];

    let schema = schema_for(ResourceKind::Repository);
    let mut out = Map::new();
    match deltas {
        None => {
            out.insert(
                "name".to_string(),
                desired.get("name").cloned().unwrap_or(Value::Null),
            );
            for field in schema.fields {
                if SIDE_CHANNEL_FIELDS.contains(&field.name) {
                    continue;
                }
                if let Some(value) = desired.get(field.name) {
                    if !value.is_null() {
                        out.insert(field.name.to_string(), value.clone());
                    }
                }
            }
        }
        Some(deltas) => {
            let mut security = Map::new();
            for delta in deltas {
                if delta.field == "name" {
                    out.insert("name".to_string(), delta.to.clone());
                    continue;
                }
                if ["secret_scanning", "secret_scanning_push_protection"]
                    .contains(&delta.field.as_str())
                {
                    security.insert(
                        delta.field.clone(),
                        json!({ "status": delta.to.clone() }),
                    );
                    continue;
                }
                if SIDE_CHANNEL_FIELDS.contains(&delta.field.as_str()) {
                    continue;
                }
                if schema.field(&delta.field).is_some() {
                    out.insert(delta.field.clone(), delta.to.clone());
                }
            }
            if !security.is_empty() {
                out.insert(
                    "security_and_analysis".to_string(),
                    Value::Object(security),
                );
            }
        }
    }
    Value::Object(out)
}

/// Picks named scalar fields out of a snapshot.
fn scalar_subset(desired: &Value, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = desired.get(*field) {
            if !value.is_null() {
                out.insert((*field).to_string(), value.clone());
            }
        }
    }
    out
}

/// String-array delta value as a set.
fn string_set(value: &Value) -> std::collections::HashSet<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
