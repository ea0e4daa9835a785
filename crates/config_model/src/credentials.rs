//! Credential-provider interface.
//!
//! Secret values in a desired-state document are opaque references like
//! `plain:hunter2` or `vault:ci/github/deploy-key`. Providers resolve a
//! reference into concrete secret material at apply time; planning never
//! resolves anything. Provider implementations beyond the `plain:`
//! passthrough live outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::CredentialError;

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;

/// A parsed secret reference: provider scheme plus provider-specific path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub scheme: String,
    pub path: String,
}

impl SecretReference {
    /// Splits `scheme:path`. A reference without a scheme is treated as
    /// `plain:` for backwards compatibility with hand-written documents.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once(':') {
            Some((scheme, path)) if !scheme.is_empty() => Self {
                scheme: scheme.to_string(),
                path: path.to_string(),
            },
            _ => Self {
                scheme: "plain".to_string(),
                path: reference.to_string(),
            },
        }
    }
}

/// Resolves opaque secret references into concrete values on demand.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The scheme this provider answers for (`plain`, `vault`, ...).
    fn scheme(&self) -> &str;

    /// Resolves one reference path into secret material.
    async fn resolve(&self, path: &str) -> Result<String, CredentialError>;
}

/// Passthrough provider: the path *is* the value.
#[derive(Debug, Default)]
pub struct PlainProvider;

#[async_trait]
impl CredentialProvider for PlainProvider {
    fn scheme(&self) -> &str {
        "plain"
    }

    async fn resolve(&self, path: &str) -> Result<String, CredentialError> {
        Ok(path.to_string())
    }
}

/// Registry dispatching references to the provider owning their scheme.
#[derive(Default)]
pub struct CredentialResolver {
    providers: HashMap<String, Arc<dyn CredentialProvider>>,
}

impl CredentialResolver {
    /// A resolver with only the `plain:` provider registered.
    pub fn with_plain() -> Self {
        let mut resolver = Self::default();
        resolver.register(Arc::new(PlainProvider));
        resolver
    }

    pub fn register(&mut self, provider: Arc<dyn CredentialProvider>) {
        self.providers
            .insert(provider.scheme().to_string(), provider);
    }

    /// Resolves a full reference string.
    pub async fn resolve(&self, reference: &str) -> Result<String, CredentialError> {
        let parsed = SecretReference::parse(reference);
        let provider = self.providers.get(&parsed.scheme).ok_or_else(|| {
            CredentialError::UnknownProvider {
                scheme: parsed.scheme.clone(),
            }
        })?;
        provider.resolve(&parsed.path).await
    }
}
