//! Shared plumbing for the CLI commands.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use config_model::{DocumentValidator, OrganizationConfig};
use github_client::{Credentials, GitHubClient, RetryPolicy, WebCredentials};
use org_steward_core::{
    DiffEngine, DiffOptions, FetchOptions, LiveStateFetcher, Plan,
};

use crate::errors::Error;

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;

/// Environment variable carrying the API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Environment variables carrying the web-channel credentials.
pub const WEB_USERNAME_ENV: &str = "ORG_STEWARD_WEB_USERNAME";
pub const WEB_PASSWORD_ENV: &str = "ORG_STEWARD_WEB_PASSWORD";
pub const WEB_TOTP_ENV: &str = "ORG_STEWARD_WEB_TOTP_SECRET";

/// Engine-related flags shared by `plan` and `apply`.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub struct EngineFlags {
    /// Exclude fields only reachable through the web UI.
    #[arg(short = 'n', long = "no-web-ui")]
    pub no_web_ui: bool,

    /// Enable deletion of resources present on GitHub but absent from the
    /// configuration.
    #[arg(short = 'd', long = "delete-resources")]
    pub delete_resources: bool,

    /// Always update managed secret values (live values are unknowable).
    #[arg(long = "update-secrets")]
    pub update_secrets: bool,

    /// Always update managed webhook shared secrets.
    #[arg(long = "update-webhooks")]
    pub update_webhooks: bool,
}

impl EngineFlags {
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            include_web_fields: !self.no_web_ui,
            delete_resources: self.delete_resources,
            update_secrets: self.update_secrets,
            update_webhooks: self.update_webhooks,
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            include_web: !self.no_web_ui,
            ..FetchOptions::default()
        }
    }
}

/// Reads the raw desired-state document.
pub fn read_document(path: &Path) -> Result<Value, Error> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| Error::ConfigParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Validates and parses the document in one pass.
pub fn load_document(path: &Path) -> Result<config_model::DesiredStateDocument, Error> {
    let raw = read_document(path)?;
    let validator = DocumentValidator::new().map_err(Error::Config)?;
    Ok(validator.parse(&raw)?)
}

/// The retry policy, tunable through the environment.
///
/// `ORG_STEWARD_MAX_RETRIES`, `ORG_STEWARD_RETRY_BASE_SECS` and
/// `ORG_STEWARD_RETRY_MAX_SECS` override the defaults; the backoff curve is
/// an operational tuning parameter, not a constant.
pub fn retry_policy() -> RetryPolicy {
    let mut policy = RetryPolicy::default();
    if let Some(value) = env_number("ORG_STEWARD_MAX_RETRIES") {
        policy.max_retries = value as u32;
    }
    if let Some(value) = env_number("ORG_STEWARD_RETRY_BASE_SECS") {
        policy.base_delay_secs = value;
    }
    if let Some(value) = env_number("ORG_STEWARD_RETRY_MAX_SECS") {
        policy.max_delay_secs = value;
    }
    policy
}

fn env_number(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

/// Assembles credentials from the environment.
///
/// The web triple is optional; when `include_web` is false it is ignored
/// even if present.
pub fn credentials(include_web: bool) -> Result<Credentials, Error> {
    let api_token = std::env::var(TOKEN_ENV)
        .map_err(|_| Error::MissingCredentials(format!("{TOKEN_ENV} is not set")))?;

    let web = if include_web {
        match (
            std::env::var(WEB_USERNAME_ENV),
            std::env::var(WEB_PASSWORD_ENV),
            std::env::var(WEB_TOTP_ENV),
        ) {
            (Ok(username), Ok(password), Ok(totp_secret)) => Some(WebCredentials {
                username,
                password: SecretString::from(password),
                totp_secret: SecretString::from(totp_secret),
            }),
            _ => {
                debug!("Web credentials not fully configured; web channel disabled");
                None
            }
        }
    } else {
        None
    };

    Ok(Credentials {
        api_token: SecretString::from(api_token),
        web,
    })
}

/// Builds one client. Each organization gets its own instance so rate-limit
/// backoff and the response cache stay per-credential, never global.
pub fn build_client(include_web: bool) -> Result<Arc<GitHubClient>, Error> {
    let credentials = credentials(include_web)?;
    Ok(Arc::new(GitHubClient::new(&credentials, retry_policy())?))
}

/// Fetches live state and computes the plan for one organization.
pub async fn plan_for_org(
    client: Arc<GitHubClient>,
    desired: &OrganizationConfig,
    flags: &EngineFlags,
) -> Result<Plan, Error> {
    let mut fetch_options = flags.fetch_options();
    // Without web credentials the web channel cannot be read even when the
    // caller did not pass --no-web-ui.
    if client.web().is_none() {
        fetch_options.include_web = false;
    }
    let fetcher = LiveStateFetcher::new(client, fetch_options);
    let live = fetcher.fetch_organization(&desired.github_id).await?;

    let mut diff_options = flags.diff_options();
    if !fetch_options.include_web {
        diff_options.include_web_fields = false;
    }
    Ok(DiffEngine::new(diff_options).diff(&live, desired))
}
