//! Tests for the REST channel: caching, pagination, error classification.

use super::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel(server: &MockServer) -> RestChannel {
    channel_with_policy(server, RetryPolicy::new(2, 0))
}

fn channel_with_policy(server: &MockServer, retry: RetryPolicy) -> RestChannel {
    let octocrab = octocrab::Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    RestChannel::new(octocrab, retry)
}

#[tokio::test]
async fn test_get_caches_identical_reads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "acme",
            "billing_email": "ops@acme.example",
        })))
        .expect(1) // The second read must come from the cache.
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let first = channel.get("/orgs/acme").await.unwrap();
    let second = channel.get("/orgs/acme").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["login"], "acme");
}

#[tokio::test]
async fn test_get_all_follows_pagination() {
    let mock_server = MockServer::start().await;

    let full_page: Vec<Value> = (0..100).map(|i| json!({ "id": i })).collect();
    let short_page: Vec<Value> = vec![json!({ "id": 100 }), json!({ "id": 101 })];

    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(short_page)))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let items = channel.get_all("/orgs/acme/repos").await.unwrap();
    assert_eq!(items.len(), 102);
    // Arrival order is preserved across pages.
    assert_eq!(items[0]["id"], 0);
    assert_eq!(items[101]["id"], 101);
}

#[tokio::test]
async fn test_get_all_wrapped_unwraps_items() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/actions/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "secrets": [
                { "name": "DEPLOY_KEY" },
                { "name": "NPM_TOKEN" },
            ],
        })))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let items = channel
        .get_all_wrapped("/orgs/acme/actions/secrets", "secrets")
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "DEPLOY_KEY");
}

#[tokio::test]
async fn test_mutation_invalidates_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "acme" })))
        .expect(2) // Read, mutate, read again: second read must hit the network.
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orgs/acme/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    channel.get("/orgs/acme").await.unwrap();
    channel
        .post("/orgs/acme/hooks", &json!({ "name": "web" }))
        .await
        .unwrap();
    channel.get("/orgs/acme").await.unwrap();
}

#[tokio::test]
async fn test_not_found_classification() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest",
        })))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let result = channel.get("/orgs/missing").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_rate_limit_retries_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "API rate limit exceeded for installation ID 12345.",
            "documentation_url": "https://docs.github.com/rest/overview/rate-limits",
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "acme" })))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let value = channel.get("/orgs/acme").await.unwrap();
    assert_eq!(value["login"], "acme");
}

#[tokio::test]
async fn test_retries_exhausted_surfaces_per_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "You have exceeded a secondary rate limit.",
        })))
        .mount(&mock_server)
        .await;

    let channel = channel_with_policy(&mock_server, RetryPolicy::new(1, 0));
    let result = channel.get("/orgs/acme").await;
    match result {
        Err(Error::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("Expected RetriesExhausted, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_with_empty_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/orgs/acme/hooks/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    channel.delete("/orgs/acme/hooks/7").await.unwrap();
}

#[tokio::test]
async fn test_put_with_empty_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/orgs/acme/actions/secrets/DEPLOY_KEY"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    channel
        .put(
            "/orgs/acme/actions/secrets/DEPLOY_KEY",
            Some(&json!({ "encrypted_value": "abc", "key_id": "1" })),
        )
        .await
        .unwrap();
}

#[test]
fn test_with_page_appends_cursor() {
    assert_eq!(with_page("/orgs/acme/repos", 3), "/orgs/acme/repos?per_page=100&page=3");
    assert_eq!(
        with_page("/orgs/acme/repos?type=all", 1),
        "/orgs/acme/repos?type=all&per_page=100&page=1"
    );
}
