//! Desired-state document validation.
//!
//! Validation runs in two layers: JSON Schema (generated from the model
//! types, so `additionalProperties: false` tracks the structs) and semantic
//! checks the schema cannot express (duplicate identities, bypass-actor
//! syntax, webhook URL hygiene). Violations are collected into one report,
//! never fail-fast, so a document's problems surface in a single pass.

use jsonschema::Validator;
use schemars::schema_for;
use serde_json::Value;
use tracing::debug;

use crate::bypass_actor::BypassActor;
use crate::errors::ConfigError;
use crate::model::{DesiredStateDocument, OrganizationConfig, RepositoryConfig};

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Prevents the document from being used.
    Error,
    /// Suspicious but not blocking.
    Warning,
}

/// A single problem found in a desired-state document.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    /// JSON-pointer-ish path to the offending field.
    pub field_path: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            field_path: field_path.into(),
            message: message.into(),
        }
    }

    fn warning(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ValidationSeverity::Error => "error",
            ValidationSeverity::Warning => "warning",
        };
        write!(f, "{tag}: {}: {}", self.field_path, self.message)
    }
}

/// Outcome of validating one document: every issue found, in one pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == ValidationSeverity::Error)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == ValidationSeverity::Error)
            .count()
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Validator for desired-state documents.
pub struct DocumentValidator {
    schema: Validator,
}

impl DocumentValidator {
    /// Compiles the JSON Schema generated from the document model.
    pub fn new() -> Result<Self, ConfigError> {
        let schema_value = serde_json::to_value(schema_for!(DesiredStateDocument)).map_err(|e| {
            ConfigError::SchemaGeneration {
                reason: format!("failed to serialize schema: {e}"),
            }
        })?;
        let schema = jsonschema::validator_for(&schema_value).map_err(|e| {
            ConfigError::SchemaGeneration {
                reason: format!("failed to compile schema: {e}"),
            }
        })?;
        Ok(Self { schema })
    }

    /// Validates a raw JSON document, collecting every issue.
    pub fn validate(&self, document: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();

        for error in self.schema.iter_errors(document) {
            report.push(ValidationIssue::error(
                error.instance_path().to_string(),
                error.to_string(),
            ));
        }

        // Semantic checks only make sense once the document has the right
        // shape.
        if report.is_valid() {
            match serde_json::from_value::<DesiredStateDocument>(document.clone()) {
                Ok(parsed) => validate_semantics(&parsed, &mut report),
                Err(e) => report.push(ValidationIssue::error("", format!("parse failure: {e}"))),
            }
        }

        debug!(
            issues = report.issues().len(),
            errors = report.error_count(),
            "Validated desired-state document"
        );
        report
    }

    /// Validates and deserializes in one step.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` carrying every error-severity
    /// issue when the document is invalid.
    pub fn parse(&self, document: &Value) -> Result<DesiredStateDocument, ConfigError> {
        let report = self.validate(document);
        if !report.is_valid() {
            return Err(ConfigError::ValidationFailed {
                error_count: report.error_count(),
                errors: report
                    .issues()
                    .iter()
                    .filter(|issue| issue.severity == ValidationSeverity::Error)
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        serde_json::from_value(document.clone()).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })
    }
}

fn validate_semantics(document: &DesiredStateDocument, report: &mut ValidationReport) {
    let mut seen_orgs = std::collections::HashSet::new();
    for (index, org) in document.organizations.iter().enumerate() {
        let path = format!("/organizations/{index}");
        if !seen_orgs.insert(org.github_id.clone()) {
            report.push(ValidationIssue::error(
                format!("{path}/github_id"),
                format!("duplicate organization '{}'", org.github_id),
            ));
        }
        validate_organization(org, &path, report);
    }
}

fn validate_organization(org: &OrganizationConfig, path: &str, report: &mut ValidationReport) {
    check_unique(
        org.repositories.iter().map(|r| r.name.as_str()),
        &format!("{path}/repositories"),
        "repository",
        report,
    );
    check_unique(
        org.webhooks.iter().map(|w| w.url.as_str()),
        &format!("{path}/webhooks"),
        "webhook",
        report,
    );
    check_unique(
        org.secrets.iter().map(|s| s.name.as_str()),
        &format!("{path}/secrets"),
        "secret",
        report,
    );
    check_unique(
        org.variables.iter().map(|v| v.name.as_str()),
        &format!("{path}/variables"),
        "variable",
        report,
    );
    check_unique(
        org.rulesets.iter().map(|r| r.name.as_str()),
        &format!("{path}/rulesets"),
        "ruleset",
        report,
    );
    check_unique(
        org.teams.iter().map(|t| t.name.as_str()),
        &format!("{path}/teams"),
        "team",
        report,
    );
    check_unique(
        org.roles.iter().map(|r| r.name.as_str()),
        &format!("{path}/roles"),
        "role",
        report,
    );

    for (index, secret) in org.secrets.iter().enumerate() {
        validate_secret_name(&secret.name, &format!("{path}/secrets/{index}/name"), report);
        if secret.visibility.as_deref() == Some("selected")
            && secret.selected_repositories.is_empty()
        {
            report.push(ValidationIssue::warning(
                format!("{path}/secrets/{index}/selected_repositories"),
                "visibility is 'selected' but no repositories are listed",
            ));
        }
    }

    for (index, webhook) in org.webhooks.iter().enumerate() {
        validate_webhook_url(&webhook.url, &format!("{path}/webhooks/{index}/url"), report);
    }

    for (index, ruleset) in org.rulesets.iter().enumerate() {
        check_actors(
            &ruleset.bypass_actors,
            &format!("{path}/rulesets/{index}/bypass_actors"),
            report,
        );
    }

    for (index, repo) in org.repositories.iter().enumerate() {
        validate_repository(repo, &format!("{path}/repositories/{index}"), report);
    }
}

fn validate_repository(repo: &RepositoryConfig, path: &str, report: &mut ValidationReport) {
    check_unique(
        repo.branch_protection_rules.iter().map(|r| r.pattern.as_str()),
        &format!("{path}/branch_protection_rules"),
        "branch protection rule",
        report,
    );
    check_unique(
        repo.webhooks.iter().map(|w| w.url.as_str()),
        &format!("{path}/webhooks"),
        "webhook",
        report,
    );
    check_unique(
        repo.secrets.iter().map(|s| s.name.as_str()),
        &format!("{path}/secrets"),
        "secret",
        report,
    );
    check_unique(
        repo.environments.iter().map(|e| e.name.as_str()),
        &format!("{path}/environments"),
        "environment",
        report,
    );
    check_unique(
        repo.rulesets.iter().map(|r| r.name.as_str()),
        &format!("{path}/rulesets"),
        "ruleset",
        report,
    );

    for (index, rule) in repo.branch_protection_rules.iter().enumerate() {
        let rule_path = format!("{path}/branch_protection_rules/{index}");
        for (field, actors) in [
            ("bypass_pull_request_allowances", &rule.bypass_pull_request_allowances),
            ("bypass_force_push_allowances", &rule.bypass_force_push_allowances),
            ("push_restrictions", &rule.push_restrictions),
            ("review_dismissal_allowances", &rule.review_dismissal_allowances),
        ] {
            check_actors(actors, &format!("{rule_path}/{field}"), report);
        }
    }

    for (index, ruleset) in repo.rulesets.iter().enumerate() {
        check_actors(
            &ruleset.bypass_actors,
            &format!("{path}/rulesets/{index}/bypass_actors"),
            report,
        );
    }

    for (index, environment) in repo.environments.iter().enumerate() {
        check_actors(
            &environment.reviewers,
            &format!("{path}/environments/{index}/reviewers"),
            report,
        );
    }

    for (index, webhook) in repo.webhooks.iter().enumerate() {
        validate_webhook_url(&webhook.url, &format!("{path}/webhooks/{index}/url"), report);
    }

    for (index, secret) in repo.secrets.iter().enumerate() {
        validate_secret_name(&secret.name, &format!("{path}/secrets/{index}/name"), report);
    }
}

fn check_unique<'a>(
    names: impl Iterator<Item = &'a str>,
    path: &str,
    what: &str,
    report: &mut ValidationReport,
) {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            report.push(ValidationIssue::error(
                path.to_string(),
                format!("duplicate {what} '{name}'"),
            ));
        }
    }
}

fn check_actors(actors: &[String], path: &str, report: &mut ValidationReport) {
    for actor in actors {
        if let Err(e) = BypassActor::parse(actor) {
            report.push(ValidationIssue::error(path.to_string(), e.to_string()));
        }
    }
}

fn validate_webhook_url(url: &str, path: &str, report: &mut ValidationReport) {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "https" => {}
        Ok(parsed) if parsed.scheme() == "http" => {
            report.push(ValidationIssue::warning(
                path.to_string(),
                "webhook delivers over plain http",
            ));
        }
        Ok(parsed) => {
            report.push(ValidationIssue::error(
                path.to_string(),
                format!("unsupported webhook scheme '{}'", parsed.scheme()),
            ));
        }
        Err(e) => {
            report.push(ValidationIssue::error(
                path.to_string(),
                format!("invalid webhook url: {e}"),
            ));
        }
    }
}

fn validate_secret_name(name: &str, path: &str, report: &mut ValidationReport) {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    let starts_ok = name.chars().next().is_some_and(|c| !c.is_ascii_digit());
    if name.is_empty() || !valid_chars || !starts_ok {
        report.push(ValidationIssue::error(
            path.to_string(),
            format!("'{name}' is not a valid secret name"),
        ));
    } else if name.to_uppercase().starts_with("GITHUB_") {
        report.push(ValidationIssue::error(
            path.to_string(),
            "secret names may not start with GITHUB_",
        ));
    }
}
