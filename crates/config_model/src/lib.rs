//! Canonical configuration model for GitHub organizations.
//!
//! This crate defines the tree of entities a reconciliation run operates on
//! (organization, repositories, branch-protection rules, rulesets, webhooks,
//! secrets, variables, environments, teams, roles), the field schemas tagging
//! every managed field with its provider channel, JSON-Schema validation of
//! desired-state documents, the bypass-actor string format, and the
//! credential-provider interface used to resolve secret references at apply
//! time.
//!
//! The model is deliberately stateless: instances are built fresh for each
//! run (desired state from the resolved document, live state from a fetch)
//! and discarded with the run.

pub mod errors;
pub use errors::{ConfigError, ConfigResult, CredentialError};

pub mod model;
pub use model::{
    is_redacted, BranchProtectionRule, CustomRole, DesiredStateDocument, EnvironmentConfig,
    OrganizationConfig, OrganizationSettings, RepositoryConfig, RulesetConfig, SecretConfig,
    TeamConfig, VariableConfig, WebhookConfig, REDACTED_VALUE,
};

pub mod schema;
pub use schema::{
    schema_for, FieldSchema, ProviderTag, ResourceKind, ResourceSchema, ValueType,
};

pub mod bypass_actor;
pub use bypass_actor::{ActorKind, BypassActor, BypassScope};

pub mod validate;
pub use validate::{DocumentValidator, ValidationIssue, ValidationReport, ValidationSeverity};

pub mod credentials;
pub use credentials::{CredentialProvider, CredentialResolver, PlainProvider, SecretReference};

pub mod web_settings;
pub use web_settings::{web_setting_for, ORGANIZATION_WEB_SETTINGS};
