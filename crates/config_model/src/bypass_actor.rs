//! Bypass-actor string format.
//!
//! Roles, teams, users and GitHub Apps that may bypass a ruleset or appear
//! in a branch-protection allowance list are written as compact strings:
//!
//! - `#admin` for a repository role
//! - `@acme/platform` for a team, as org/slug
//! - `@octocat` for a user login
//! - `deploy-bot` for a GitHub App slug
//!
//! An optional `:always` or `:pull_request` suffix scopes when the bypass
//! applies. The string form is both the on-disk representation and the
//! round-trip target of GraphQL actor resolution.

use std::fmt;

use serde_json::Value;

use crate::errors::ConfigError;

#[cfg(test)]
#[path = "bypass_actor_tests.rs"]
mod tests;

/// When a bypass applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassScope {
    Always,
    PullRequest,
}

impl BypassScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::PullRequest => "pull_request",
        }
    }
}

/// The entity a bypass actor refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorKind {
    /// A repository role by name (`#admin`).
    Role(String),
    /// A team as organization + slug (`@acme/platform`).
    Team { org: String, slug: String },
    /// A user by login (`@octocat`).
    User(String),
    /// A GitHub App by slug (`deploy-bot`).
    App(String),
}

/// A parsed bypass actor with its optional scope suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassActor {
    pub kind: ActorKind,
    pub scope: Option<BypassScope>,
}

impl BypassActor {
    /// Parses the string form.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBypassActor {
            actor: input.to_string(),
            reason: reason.to_string(),
        };

        let (body, scope) = if let Some(stripped) = input.strip_suffix(":always") {
            (stripped, Some(BypassScope::Always))
        } else if let Some(stripped) = input.strip_suffix(":pull_request") {
            (stripped, Some(BypassScope::PullRequest))
        } else {
            (input, None)
        };

        if body.is_empty() {
            return Err(invalid("empty actor"));
        }

        let kind = if let Some(role) = body.strip_prefix('#') {
            if role.is_empty() {
                return Err(invalid("role name missing after '#'"));
            }
            ActorKind::Role(role.to_string())
        } else if let Some(rest) = body.strip_prefix('@') {
            match rest.split('/').collect::<Vec<_>>().as_slice() {
                [login] if !login.is_empty() => ActorKind::User((*login).to_string()),
                [org, slug] if !org.is_empty() && !slug.is_empty() => ActorKind::Team {
                    org: (*org).to_string(),
                    slug: (*slug).to_string(),
                },
                _ => return Err(invalid("expected '@login' or '@org/team-slug'")),
            }
        } else {
            if body.contains('/') || body.contains('@') || body.contains(':') {
                return Err(invalid("app slug contains reserved characters"));
            }
            ActorKind::App(body.to_string())
        };

        Ok(Self { kind, scope })
    }

    /// Builds an actor from a GraphQL `App|Team|User` union node.
    ///
    /// Allowance actors carry no scope, so none is attached; the string form
    /// therefore round-trips unchanged through GraphQL resolution.
    pub fn from_graphql_node(node: &Value) -> Result<Self, ConfigError> {
        let typename = node
            .get("__typename")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let invalid = |reason: String| ConfigError::InvalidBypassActor {
            actor: node.to_string(),
            reason,
        };

        let kind = match typename {
            "Team" => {
                let combined = node
                    .get("combinedSlug")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("team node without combinedSlug".to_string()))?;
                let (org, slug) = combined
                    .split_once('/')
                    .ok_or_else(|| invalid(format!("malformed combinedSlug '{combined}'")))?;
                ActorKind::Team {
                    org: org.to_string(),
                    slug: slug.to_string(),
                }
            }
            "User" => {
                let login = node
                    .get("login")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("user node without login".to_string()))?;
                ActorKind::User(login.to_string())
            }
            "App" => {
                let slug = node
                    .get("slug")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("app node without slug".to_string()))?;
                ActorKind::App(slug.to_string())
            }
            other => return Err(invalid(format!("unsupported actor type '{other}'"))),
        };

        Ok(Self { kind, scope: None })
    }

    /// Attaches a scope suffix.
    pub fn with_scope(mut self, scope: BypassScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl fmt::Display for BypassActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActorKind::Role(role) => write!(f, "#{role}")?,
            ActorKind::Team { org, slug } => write!(f, "@{org}/{slug}")?,
            ActorKind::User(login) => write!(f, "@{login}")?,
            ActorKind::App(slug) => write!(f, "{slug}")?,
        }
        if let Some(scope) = self.scope {
            write!(f, ":{}", scope.as_str())?;
        }
        Ok(())
    }
}

/// Repository role ids as used by the ruleset REST endpoints.
pub fn repository_role_id(name: &str) -> Option<u64> {
    match name {
        "read" => Some(1),
        "maintain" => Some(2),
        "write" => Some(4),
        "admin" => Some(5),
        _ => None,
    }
}

/// Inverse of [`repository_role_id`].
pub fn repository_role_name(id: u64) -> Option<&'static str> {
    match id {
        1 => Some("read"),
        2 => Some("maintain"),
        4 => Some("write"),
        5 => Some("admin"),
        _ => None,
    }
}
