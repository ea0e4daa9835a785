//! The Plan: an ordered forest of per-resource change sets.
//!
//! A plan is what the diff engine hands to the approval gate and the
//! executor. Entries are ordered by structural dependency: a parent (the
//! repository) always precedes the children that reference it (its rules,
//! webhooks, environments). Suppressed deletions stay in the plan for
//! display but are marked non-actionable.

use serde_json::Value;

use config_model::ResourceKind;

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;

/// Classification of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Update,
    /// Delete-then-recreate, for fields GitHub cannot change in place.
    ForcedUpdate,
    Delete,
    Noop,
}

impl ChangeAction {
    /// Prefix used in plan text rendering.
    pub fn symbol(&self) -> char {
        match self {
            Self::Create => '+',
            Self::Update => '~',
            Self::ForcedUpdate => '!',
            Self::Delete => '-',
            Self::Noop => ' ',
        }
    }
}

/// One field-level difference.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDelta {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

impl FieldDelta {
    pub fn new(field: impl Into<String>, from: Value, to: Value) -> Self {
        Self {
            field: field.into(),
            from,
            to,
        }
    }
}

/// A change set for one resource, with its dependent children.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub kind: ResourceKind,
    /// Identity within the parent (repository name, rule pattern, hook URL).
    pub identity: String,
    pub action: ChangeAction,
    /// False for deletions computed but not enabled.
    pub actionable: bool,
    pub deltas: Vec<FieldDelta>,
    /// Snapshot of the desired object, used to build create/update payloads.
    pub desired: Option<Value>,
    /// Live-side identity when the resource was matched through an alias
    /// (pending rename); mutations address the live identity.
    pub live_identity: Option<String>,
    pub children: Vec<ResourceChange>,
}

impl ResourceChange {
    pub fn noop(kind: ResourceKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
            action: ChangeAction::Noop,
            actionable: true,
            deltas: Vec::new(),
            desired: None,
            live_identity: None,
            children: Vec::new(),
        }
    }

    /// Whether this node and every descendant is a no-op.
    pub fn is_noop_tree(&self) -> bool {
        self.action == ChangeAction::Noop && self.children.iter().all(Self::is_noop_tree)
    }

    /// The identity mutations must address on the live side.
    pub fn target_identity(&self) -> &str {
        self.live_identity.as_deref().unwrap_or(&self.identity)
    }
}

/// Aggregate counts for summary reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub forced_updates: usize,
    pub deletes: usize,
    pub suppressed_deletes: usize,
    pub noops: usize,
}

impl PlanSummary {
    fn add(&mut self, change: &ResourceChange) {
        match change.action {
            ChangeAction::Create => self.creates += 1,
            ChangeAction::Update => self.updates += 1,
            ChangeAction::ForcedUpdate => self.forced_updates += 1,
            ChangeAction::Delete => {
                if change.actionable {
                    self.deletes += 1;
                } else {
                    self.suppressed_deletes += 1;
                }
            }
            ChangeAction::Noop => self.noops += 1,
        }
        for child in &change.children {
            self.add(child);
        }
    }

    /// Total number of actionable mutations.
    pub fn actionable(&self) -> usize {
        self.creates + self.updates + self.forced_updates + self.deletes
    }
}

/// The full plan for one organization.
#[derive(Debug, Clone)]
pub struct Plan {
    pub organization: String,
    pub changes: Vec<ResourceChange>,
}

impl Plan {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            changes: Vec::new(),
        }
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            summary.add(change);
        }
        summary
    }

    /// An empty plan holds no creates, updates, forced updates or deletes
    /// (suppressed deletions included: they still represent drift).
    pub fn is_empty(&self) -> bool {
        let summary = self.summary();
        summary.actionable() == 0 && summary.suppressed_deletes == 0
    }

    /// Whether deletions were computed but not enabled.
    pub fn has_suppressed_deletes(&self) -> bool {
        self.summary().suppressed_deletes > 0
    }

    /// Renders the plan as text: `+` create, `~` update, `!` forced update,
    /// `-` delete, with `field = old -> new` lines for every delta.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("organization {}:\n", self.organization));
        for change in &self.changes {
            render_change(change, 1, &mut out);
        }
        let summary = self.summary();
        out.push_str(&format!(
            "\n{} to add, {} to change, {} to replace, {} to delete",
            summary.creates, summary.updates, summary.forced_updates, summary.deletes
        ));
        if summary.suppressed_deletes > 0 {
            out.push_str(&format!(
                " ({} deletion(s) withheld; enable with --delete-resources)",
                summary.suppressed_deletes
            ));
        }
        out.push('\n');
        out
    }
}

fn render_change(change: &ResourceChange, depth: usize, out: &mut String) {
    if change.is_noop_tree() {
        return;
    }
    let indent = "  ".repeat(depth);
    if change.action != ChangeAction::Noop {
        let mut line = format!(
            "{indent}{} {}[{}]",
            change.action.symbol(),
            change.kind.display(),
            change.identity
        );
        if change.action == ChangeAction::Delete && !change.actionable {
            line.push_str(" (deletion not enabled)");
        }
        if let Some(live) = &change.live_identity {
            if live != &change.identity {
                line.push_str(&format!(" (renamed from '{live}')"));
            }
        }
        out.push_str(&line);
        out.push('\n');
        for delta in &change.deltas {
            out.push_str(&format!(
                "{indent}    {} = {} -> {}\n",
                delta.field,
                render_value(&delta.from),
                render_value(&delta.to)
            ));
        }
    }
    for child in &change.children {
        render_change(child, depth + 1, out);
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "(unset)".to_string(),
        other => other.to_string(),
    }
}
