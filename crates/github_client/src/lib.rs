//! Crate for interacting with GitHub over its three configuration surfaces.
//!
//! GitHub exposes organization configuration through three heterogeneous
//! channels: the REST API, the GraphQL API, and, for a handful of settings,
//! only the web UI. This crate puts all three behind one client so callers
//! can read and write any configured field without caring which surface it
//! lives on.
//!
//! All channels share one rate-limit policy: 403/429 responses back off using
//! the reset hint when GitHub provides one, otherwise exponentially, up to a
//! configurable retry cap.

use octocrab::Octocrab;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

pub mod errors;
pub use errors::Error;

pub mod graphql;
pub mod models;
pub mod rate_limit;
pub mod rest;
pub mod web;

pub use graphql::GraphQlChannel;
pub use models::{ActionsPublicKey, SecurityAdvisory};
pub use rate_limit::RetryPolicy;
pub use rest::RestChannel;
pub use web::{ControlKind, WebChannel, WebCredentials, WebSession, WebSetting};

// Reference the tests module in the separate file
#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Credentials for one organization's run.
///
/// The API token drives the REST and GraphQL channels. Web credentials are
/// optional; without them the web channel is unavailable and web-tagged
/// fields must be excluded by the caller.
pub struct Credentials {
    pub api_token: SecretString,
    pub web: Option<WebCredentials>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("web", &self.web.is_some())
            .finish()
    }
}

/// A client for one GitHub organization, combining the REST, GraphQL and web
/// channels behind a single facade.
#[derive(Debug)]
pub struct GitHubClient {
    rest: RestChannel,
    graphql: GraphQlChannel,
    web: Option<WebChannel>,
}

impl GitHubClient {
    /// Builds a client from credentials and a retry policy.
    ///
    /// # Errors
    ///
    /// Returns an `Error::AuthError` if the underlying HTTP clients cannot
    /// be constructed.
    pub fn new(credentials: &Credentials, retry: RetryPolicy) -> Result<Self, Error> {
        let octocrab = create_token_client(credentials.api_token.expose_secret())?;
        let web = match &credentials.web {
            Some(web_credentials) => Some(WebChannel::new(web_credentials.clone())?),
            None => None,
        };
        Ok(Self::from_octocrab(octocrab, retry, web))
    }

    /// Builds a client around an existing [`Octocrab`] instance.
    ///
    /// Used by tests to point the channels at a mock server.
    pub fn from_octocrab(octocrab: Octocrab, retry: RetryPolicy, web: Option<WebChannel>) -> Self {
        Self {
            rest: RestChannel::new(octocrab.clone(), retry.clone()),
            graphql: GraphQlChannel::new(octocrab, retry),
            web,
        }
    }

    /// The REST channel (paginated reads, cached within the run).
    pub fn rest(&self) -> &RestChannel {
        &self.rest
    }

    /// The GraphQL channel (cursor-paginated connections).
    pub fn graphql(&self) -> &GraphQlChannel {
        &self.graphql
    }

    /// The web channel, when web credentials were supplied.
    pub fn web(&self) -> Option<&WebChannel> {
        self.web.as_ref()
    }

    /// Fetches the organization-scope public key for sealing Actions
    /// secrets.
    #[instrument(skip(self), fields(org = %org))]
    pub async fn org_actions_public_key(&self, org: &str) -> Result<ActionsPublicKey, Error> {
        let value = self
            .rest
            .get(&format!("/orgs/{org}/actions/secrets/public-key"))
            .await?;
        serde_json::from_value(value).map_err(Error::from)
    }

    /// Fetches the repository-scope public key for sealing Actions secrets.
    #[instrument(skip(self), fields(owner = %owner, repo = %repo))]
    pub async fn repo_actions_public_key(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ActionsPublicKey, Error> {
        let value = self
            .rest
            .get(&format!("/repos/{owner}/{repo}/actions/secrets/public-key"))
            .await?;
        serde_json::from_value(value).map_err(Error::from)
    }

    /// Resolves a GitHub App slug to its GraphQL node id via REST.
    ///
    /// Apps are not addressable by slug in GraphQL, so actor-id resolution
    /// for app bypass actors goes through `/apps/{slug}`.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn app_node_id(&self, slug: &str) -> Result<String, Error> {
        let value = self.rest.get(&format!("/apps/{slug}")).await?;
        value
            .get("node_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("app {slug}")))
    }

    /// Lists the organization's repository security advisories.
    #[instrument(skip(self), fields(org = %org))]
    pub async fn list_security_advisories(
        &self,
        org: &str,
    ) -> Result<Vec<SecurityAdvisory>, Error> {
        let items = self
            .rest
            .get_all(&format!("/orgs/{org}/security-advisories"))
            .await?;
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect()
    }
}

/// Creates an [`Octocrab`] client authenticated with a personal or
/// installation access token.
///
/// # Errors
/// Returns an `Error::AuthError` if the client cannot be built.
#[instrument(skip(token))]
pub fn create_token_client(token: &str) -> Result<Octocrab, Error> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(|e| Error::AuthError(format!("failed to build API client: {e}")))
}
