//! Tests for secret-reference parsing and resolution.

use super::*;

#[test]
fn test_parse_scheme_and_path() {
    let reference = SecretReference::parse("vault:ci/github/deploy-key");
    assert_eq!(reference.scheme, "vault");
    assert_eq!(reference.path, "ci/github/deploy-key");
}

#[test]
fn test_parse_without_scheme_defaults_to_plain() {
    let reference = SecretReference::parse("hunter2");
    assert_eq!(reference.scheme, "plain");
    assert_eq!(reference.path, "hunter2");
}

#[test]
fn test_parse_keeps_colons_in_path() {
    let reference = SecretReference::parse("pass:ci:github");
    assert_eq!(reference.scheme, "pass");
    assert_eq!(reference.path, "ci:github");
}

#[tokio::test]
async fn test_plain_provider_is_passthrough() {
    let resolver = CredentialResolver::with_plain();
    let value = resolver.resolve("plain:hunter2").await.unwrap();
    assert_eq!(value, "hunter2");
}

#[tokio::test]
async fn test_unknown_scheme_is_reported() {
    let resolver = CredentialResolver::with_plain();
    let result = resolver.resolve("vault:ci/key").await;
    match result {
        Err(CredentialError::UnknownProvider { scheme }) => assert_eq!(scheme, "vault"),
        other => panic!("Expected UnknownProvider, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_provider_dispatch() {
    struct StaticProvider;

    #[async_trait]
    impl CredentialProvider for StaticProvider {
        fn scheme(&self) -> &str {
            "static"
        }

        async fn resolve(&self, path: &str) -> Result<String, CredentialError> {
            match path {
                "known" => Ok("resolved-value".to_string()),
                other => Err(CredentialError::LookupFailed {
                    reference: other.to_string(),
                    reason: "no such entry".to_string(),
                }),
            }
        }
    }

    let mut resolver = CredentialResolver::with_plain();
    resolver.register(Arc::new(StaticProvider));

    assert_eq!(
        resolver.resolve("static:known").await.unwrap(),
        "resolved-value"
    );
    assert!(resolver.resolve("static:missing").await.is_err());
}
