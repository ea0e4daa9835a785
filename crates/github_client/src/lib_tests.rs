//! Unit tests for the github_client crate facade.

use super::*; // Import items from lib.rs
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GitHubClient {
    let octocrab = octocrab::Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    GitHubClient::from_octocrab(octocrab, RetryPolicy::new(1, 0), None)
}

#[tokio::test]
async fn test_create_token_client() {
    let result = create_token_client("ghp_testtoken");
    assert!(result.is_ok());
}

#[test]
fn test_credentials_debug_redacts_secrets() {
    let credentials = Credentials {
        api_token: "ghp_secret".to_string().into(),
        web: None,
    };
    let rendered = format!("{credentials:?}");
    assert!(!rendered.contains("ghp_secret"));
}

#[tokio::test]
async fn test_org_actions_public_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/actions/secrets/public-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key_id": "568250167242549743",
            "key": "sGbYqFPWZHVNxMZcDIenIbqlQvwpBrBNHTjM/iQGD1Y=",
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let key = client.org_actions_public_key("acme").await.unwrap();
    assert_eq!(key.key_id, "568250167242549743");
}

#[tokio::test]
async fn test_app_node_id_resolution() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apps/deploy-bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "slug": "deploy-bot",
            "node_id": "A_kgDOapp42",
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let node_id = client.app_node_id("deploy-bot").await.unwrap();
    assert_eq!(node_id, "A_kgDOapp42");
}

#[tokio::test]
async fn test_list_security_advisories() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/security-advisories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "ghsa_id": "GHSA-abcd-efgh-ijkl",
                "summary": "Command injection in widget pipeline",
                "severity": "high",
                "state": "published",
            }
        ])))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let advisories = client.list_security_advisories("acme").await.unwrap();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].ghsa_id, "GHSA-abcd-efgh-ijkl");
    assert_eq!(advisories[0].severity.as_deref(), Some("high"));
}
