//! Structural diff between live and desired configuration trees.
//!
//! The algorithm walks both trees node by node. Scalar fields compare by
//! value; list-of-object collections are matched by semantic identity (never
//! by position, so reordering is invisible); secret-valued fields compare by
//! presence only, because GitHub redacts them on read. Deletions are
//! computed but withheld from execution unless explicitly enabled, and
//! web-sourced fields disappear from the diff entirely when the web channel
//! is excluded.
//!
//! The one cross-cutting rule (organization-scope
//! `web_commit_signoff_required` forcing itself onto repositories without an
//! explicit override) runs as a separate rewrite pass over the finished
//! plan, so it stays testable on its own.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use tracing::{debug, instrument};

use config_model::schema::{schema_for, ResourceKind, ResourceSchema};
use config_model::{is_redacted, OrganizationConfig, RepositoryConfig, REDACTED_VALUE};

use crate::plan::{ChangeAction, FieldDelta, Plan, ResourceChange};

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

/// Caller-selected diff behavior.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// When false (`--no-web-ui`), fields tagged `web` are excluded from
    /// the diff entirely.
    pub include_web_fields: bool,
    /// When false, computed deletions stay in the plan but are not
    /// actionable.
    pub delete_resources: bool,
    /// Force an update for every managed secret value, since live values
    /// are unknowable.
    pub update_secrets: bool,
    /// Same forcing, for webhook shared secrets.
    pub update_webhooks: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_web_fields: true,
            delete_resources: false,
            update_secrets: false,
            update_webhooks: false,
        }
    }
}

/// Computes a [`Plan`] from two organization trees.
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Diffs live against desired state for one organization.
    #[instrument(skip_all, fields(org = %desired.github_id))]
    pub fn diff(&self, live: &OrganizationConfig, desired: &OrganizationConfig) -> Plan {
        let mut plan = Plan::new(&desired.github_id);

        plan.changes.push(self.diff_org_settings(live, desired));

        plan.changes.extend(self.diff_collection(
            ResourceKind::Webhook,
            &live.webhooks,
            &desired.webhooks,
            self.options.update_webhooks,
            |_, _| Vec::new(),
        ));
        plan.changes.extend(self.diff_collection(
            ResourceKind::Secret,
            &live.secrets,
            &desired.secrets,
            self.options.update_secrets,
            |_, _| Vec::new(),
        ));
        plan.changes.extend(self.diff_collection(
            ResourceKind::Variable,
            &live.variables,
            &desired.variables,
            false,
            |_, _| Vec::new(),
        ));
        plan.changes.extend(self.diff_collection(
            ResourceKind::Ruleset,
            &live.rulesets,
            &desired.rulesets,
            false,
            |_, _| Vec::new(),
        ));
        plan.changes.extend(self.diff_collection(
            ResourceKind::Team,
            &live.teams,
            &desired.teams,
            false,
            |_, _| Vec::new(),
        ));
        plan.changes.extend(self.diff_collection(
            ResourceKind::Role,
            &live.roles,
            &desired.roles,
            false,
            |_, _| Vec::new(),
        ));

        plan.changes.extend(self.diff_collection(
            ResourceKind::Repository,
            &live.repositories,
            &desired.repositories,
            false,
            |live_repo, desired_repo| self.diff_repository_children(live_repo, desired_repo),
        ));

        self.apply_signoff_cascade(live, desired, &mut plan);

        let summary = plan.summary();
        debug!(
            creates = summary.creates,
            updates = summary.updates,
            forced = summary.forced_updates,
            deletes = summary.deletes,
            suppressed = summary.suppressed_deletes,
            "Computed plan"
        );
        plan
    }

    fn diff_org_settings(
        &self,
        live: &OrganizationConfig,
        desired: &OrganizationConfig,
    ) -> ResourceChange {
        let schema = schema_for(ResourceKind::Organization);
        let live_value = to_object(&live.settings);
        let desired_value = to_object(&desired.settings);
        let (deltas, _) = self.scalar_deltas(schema, &live_value, &desired_value, false);
        let action = if deltas.is_empty() {
            ChangeAction::Noop
        } else {
            ChangeAction::Update
        };
        ResourceChange {
            kind: ResourceKind::Organization,
            identity: desired.github_id.clone(),
            action,
            actionable: true,
            deltas,
            desired: Some(desired_value),
            live_identity: None,
            children: Vec::new(),
        }
    }

    fn diff_repository_children(
        &self,
        live_repo: Option<&RepositoryConfig>,
        desired_repo: &RepositoryConfig,
    ) -> Vec<ResourceChange> {
        // A repository being created diffs its children against nothing.
        let empty = RepositoryConfig::default();
        let live_repo = live_repo.unwrap_or(&empty);
        let mut children = Vec::new();

        children.extend(self.diff_collection(
            ResourceKind::BranchProtectionRule,
            &live_repo.branch_protection_rules,
            &desired_repo.branch_protection_rules,
            false,
            |_, _| Vec::new(),
        ));
        children.extend(self.diff_collection(
            ResourceKind::Ruleset,
            &live_repo.rulesets,
            &desired_repo.rulesets,
            false,
            |_, _| Vec::new(),
        ));
        children.extend(self.diff_collection(
            ResourceKind::Webhook,
            &live_repo.webhooks,
            &desired_repo.webhooks,
            self.options.update_webhooks,
            |_, _| Vec::new(),
        ));
        children.extend(self.diff_collection(
            ResourceKind::Secret,
            &live_repo.secrets,
            &desired_repo.secrets,
            self.options.update_secrets,
            |_, _| Vec::new(),
        ));
        children.extend(self.diff_collection(
            ResourceKind::Variable,
            &live_repo.variables,
            &desired_repo.variables,
            false,
            |_, _| Vec::new(),
        ));
        children.extend(self.diff_collection(
            ResourceKind::Environment,
            &live_repo.environments,
            &desired_repo.environments,
            false,
            |_, _| Vec::new(),
        ));
        children
    }

    /// Diffs one list-valued collection by identity.
    fn diff_collection<T, F>(
        &self,
        kind: ResourceKind,
        live_items: &[T],
        desired_items: &[T],
        force_secret_update: bool,
        mut children: F,
    ) -> Vec<ResourceChange>
    where
        T: serde::Serialize,
        F: FnMut(Option<&T>, &T) -> Vec<ResourceChange>,
    {
        let schema = schema_for(kind);
        let live_values: Vec<Value> = live_items.iter().map(to_object).collect();
        let desired_values: Vec<Value> = desired_items.iter().map(to_object).collect();

        let mut live_by_identity: HashMap<String, usize> = HashMap::new();
        for (index, value) in live_values.iter().enumerate() {
            if let Some(identity) = schema.identity_of(value) {
                live_by_identity.entry(identity).or_insert(index);
            }
        }

        let mut consumed: HashSet<usize> = HashSet::new();
        let mut changes = Vec::new();

        for (desired_item, desired_value) in desired_items.iter().zip(&desired_values) {
            let Some(desired_identity) = schema.identity_of(desired_value) else {
                continue;
            };
            // Primary identity first, then aliases (rename detection).
            let matched = schema
                .identity_keys(desired_value)
                .into_iter()
                .find_map(|key| {
                    live_by_identity
                        .get(&key)
                        .copied()
                        .filter(|index| !consumed.contains(index))
                });

            match matched {
                Some(live_index) => {
                    consumed.insert(live_index);
                    let live_value = &live_values[live_index];
                    let live_identity = schema
                        .identity_of(live_value)
                        .unwrap_or_else(|| desired_identity.clone());

                    let (mut deltas, mut forced) =
                        self.scalar_deltas(schema, live_value, desired_value, force_secret_update);

                    if live_identity != desired_identity {
                        // Alias-matched rename: identity travels as a field
                        // change addressed at the live identity.
                        forced |= schema
                            .field(schema.identity_field)
                            .is_some_and(|f| f.forces_recreate);
                        deltas.insert(
                            0,
                            FieldDelta::new(
                                schema.identity_field,
                                json!(live_identity.clone()),
                                json!(desired_identity.clone()),
                            ),
                        );
                    }

                    let action = if forced {
                        ChangeAction::ForcedUpdate
                    } else if deltas.is_empty() {
                        ChangeAction::Noop
                    } else {
                        ChangeAction::Update
                    };

                    changes.push(ResourceChange {
                        kind,
                        identity: desired_identity,
                        action,
                        actionable: true,
                        deltas,
                        desired: Some(desired_value.clone()),
                        live_identity: Some(live_identity),
                        children: children(Some(&live_items[live_index]), desired_item),
                    });
                }
                None => {
                    changes.push(ResourceChange {
                        kind,
                        identity: desired_identity,
                        action: ChangeAction::Create,
                        actionable: true,
                        deltas: Vec::new(),
                        desired: Some(desired_value.clone()),
                        live_identity: None,
                        children: children(None, desired_item),
                    });
                }
            }
        }

        for (index, live_value) in live_values.iter().enumerate() {
            if consumed.contains(&index) {
                continue;
            }
            let Some(identity) = schema.identity_of(live_value) else {
                continue;
            };
            changes.push(ResourceChange {
                kind,
                identity,
                action: ChangeAction::Delete,
                actionable: self.options.delete_resources,
                deltas: Vec::new(),
                desired: None,
                live_identity: None,
                children: Vec::new(),
            });
        }

        changes
    }

    /// Field-level comparison of one matched pair.
    ///
    /// Returns the deltas plus whether any differing field forces a
    /// delete-and-recreate.
    fn scalar_deltas(
        &self,
        schema: &ResourceSchema,
        live: &Value,
        desired: &Value,
        force_secret_update: bool,
    ) -> (Vec<FieldDelta>, bool) {
        let mut deltas = Vec::new();
        let mut forced = false;

        for field in schema.diffable_fields(self.options.include_web_fields) {
            let live_value = non_null(live.get(field.name));
            let desired_value = non_null(desired.get(field.name));

            if field.secret {
                if let Some(delta) =
                    secret_delta(field.name, live_value, desired_value, force_secret_update)
                {
                    deltas.push(delta);
                }
                continue;
            }

            // An unspecified desired field is unmanaged and never diffs.
            let Some(desired_value) = desired_value else {
                continue;
            };

            let equal = match live_value {
                Some(live_value) => values_equal(live_value, desired_value),
                None => false,
            };
            if !equal {
                forced |= field.forces_recreate;
                deltas.push(FieldDelta::new(
                    field.name,
                    live_value.cloned().unwrap_or(Value::Null),
                    desired_value.clone(),
                ));
            }
        }

        (deltas, forced)
    }

    /// The one cascading rule in the model, applied as a post-diff rewrite.
    ///
    /// When the organization-scope `web_commit_signoff_required` changes,
    /// every repository that does not explicitly override the field receives
    /// a derived update to the same value.
    fn apply_signoff_cascade(
        &self,
        live: &OrganizationConfig,
        desired: &OrganizationConfig,
        plan: &mut Plan,
    ) {
        let target = plan
            .changes
            .iter()
            .find(|change| change.kind == ResourceKind::Organization)
            .and_then(|change| {
                change
                    .deltas
                    .iter()
                    .find(|delta| delta.field == "web_commit_signoff_required")
            })
            .and_then(|delta| delta.to.as_bool());
        let Some(target) = target else {
            return;
        };

        for desired_repo in &desired.repositories {
            if desired_repo.web_commit_signoff_required.is_some() {
                // Explicit override wins over the cascade.
                continue;
            }
            let live_value = live
                .repository(&desired_repo.name)
                .and_then(|repo| repo.web_commit_signoff_required);
            if live_value == Some(target) {
                continue;
            }

            let node = plan.changes.iter_mut().find(|change| {
                change.kind == ResourceKind::Repository && change.identity == desired_repo.name
            });
            let Some(node) = node else {
                continue;
            };
            if matches!(node.action, ChangeAction::Create | ChangeAction::Delete) {
                // New repositories inherit the organization default; deleted
                // ones are gone either way.
                continue;
            }
            debug!(
                repository = %desired_repo.name,
                value = target,
                "Deriving web_commit_signoff_required from organization setting"
            );
            node.deltas.push(FieldDelta::new(
                "web_commit_signoff_required",
                live_value.map_or(Value::Null, Value::Bool),
                Value::Bool(target),
            ));
            if node.action == ChangeAction::Noop {
                node.action = ChangeAction::Update;
            }
        }
    }
}

/// Serializes a model node to a JSON object.
fn to_object<T: serde::Serialize>(item: &T) -> Value {
    serde_json::to_value(item).unwrap_or(Value::Null)
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Presence-only comparison for secret-valued fields.
///
/// A live redacted value never differs from a desired plaintext or
/// reference; with the force flag set, a managed desired value always
/// produces an update since the truth is unknowable. Delta values are
/// redacted so secret material never reaches plan output.
fn secret_delta(
    field: &str,
    live: Option<&Value>,
    desired: Option<&Value>,
    force: bool,
) -> Option<FieldDelta> {
    let live_present = live.is_some();
    let desired_present = desired.is_some();

    match (live_present, desired_present) {
        (false, true) => Some(FieldDelta::new(field, Value::Null, json!(REDACTED_VALUE))),
        (true, false) => Some(FieldDelta::new(field, json!(REDACTED_VALUE), Value::Null)),
        (true, true) => {
            let live_is_redacted = live
                .and_then(Value::as_str)
                .map(is_redacted)
                .unwrap_or(false);
            let differs = if live_is_redacted {
                // Redacted vs anything is not a detected change.
                force
            } else {
                force || live != desired
            };
            differs.then(|| {
                FieldDelta::new(field, json!(REDACTED_VALUE), json!(REDACTED_VALUE))
            })
        }
        (false, false) => None,
    }
}

/// Value equality with order-insensitive arrays.
///
/// List-valued fields are sets keyed by their own contents, so
/// `["a", "b"]` equals `["b", "a"]`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_array(), b.as_array()) {
        (Some(left), Some(right)) => {
            if left.len() != right.len() {
                return false;
            }
            let mut left_sorted: Vec<String> = left.iter().map(Value::to_string).collect();
            let mut right_sorted: Vec<String> = right.iter().map(Value::to_string).collect();
            left_sorted.sort_unstable();
            right_sorted.sort_unstable();
            left_sorted == right_sorted
        }
        _ => a == b,
    }
}
