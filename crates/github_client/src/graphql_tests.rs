//! Tests for the GraphQL channel.

use super::*;
use crate::rate_limit::RetryPolicy;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel(server: &MockServer) -> GraphQlChannel {
    let octocrab = octocrab::Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    GraphQlChannel::new(octocrab, RetryPolicy::new(1, 0))
}

#[test]
fn test_check_graphql_errors_passes_clean_response() {
    let response = json!({ "data": { "repository": { "id": "R_1" } } });
    assert!(check_graphql_errors(&response).is_ok());
}

#[test]
fn test_check_graphql_errors_rate_limited() {
    let response = json!({
        "errors": [{ "type": "RATE_LIMITED", "message": "API rate limit exceeded" }]
    });
    let result = check_graphql_errors(&response);
    assert!(matches!(result, Err(Error::RateLimited { .. })));
}

#[test]
fn test_check_graphql_errors_not_found() {
    let response = json!({
        "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a Repository" }]
    });
    assert!(matches!(
        check_graphql_errors(&response),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_check_graphql_errors_generic() {
    let response = json!({
        "errors": [{ "message": "Something went wrong" }]
    });
    assert!(matches!(
        check_graphql_errors(&response),
        Err(Error::ApiError(_))
    ));
}

#[test]
fn test_branch_protection_query_requests_all_connections() {
    let query = branch_protection_query();
    for connection in ALLOWANCE_CONNECTIONS {
        assert!(query.contains(connection), "query missing {connection}");
    }
    assert!(query.contains("pageInfo { hasNextPage endCursor }"));
    assert!(query.contains("requiredApprovingReviewCount"));
    assert!(query.contains("... on Team { combinedSlug }"));
}

#[test]
fn test_allowance_continuation_query_targets_connection() {
    let query = allowance_continuation_query("pushAllowances");
    assert!(query.contains("pushAllowances(first:"));
    assert!(query.contains("... on BranchProtectionRule"));
}

#[tokio::test]
async fn test_paginate_follows_cursors_and_merges_in_order() {
    let mock_server = MockServer::start().await;

    let page1 = json!({
        "data": { "repository": { "branchProtectionRules": {
            "nodes": [{ "pattern": "main" }, { "pattern": "release/*" }],
            "pageInfo": { "hasNextPage": true, "endCursor": "CURSOR1" }
        } } }
    });
    let page2 = json!({
        "data": { "repository": { "branchProtectionRules": {
            "nodes": [{ "pattern": "hotfix/*" }],
            "pageInfo": { "hasNextPage": false, "endCursor": null }
        } } }
    });

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page1))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page2))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let nodes = channel
        .paginate(
            |cursor| {
                (
                    branch_protection_query(),
                    json!({ "owner": "acme", "name": "widget", "cursor": cursor }),
                )
            },
            "/data/repository/branchProtectionRules",
        )
        .await
        .unwrap();

    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0]["pattern"], "main");
    assert_eq!(nodes[2]["pattern"], "hotfix/*");
}

#[tokio::test]
async fn test_branch_protection_rules_flattens_allowances() {
    let mock_server = MockServer::start().await;

    let page = json!({
        "data": { "repository": { "branchProtectionRules": {
            "nodes": [{
                "id": "BPR_1",
                "pattern": "main",
                "requiresApprovingReviews": true,
                "requiredApprovingReviewCount": 2,
                "bypassPullRequestAllowances": {
                    "nodes": [
                        { "actor": { "__typename": "Team", "combinedSlug": "acme/admins" } }
                    ],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                },
                "bypassForcePushAllowances": {
                    "nodes": [],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                },
                "pushAllowances": {
                    "nodes": [
                        { "actor": { "__typename": "User", "login": "octocat" } },
                        { "actor": { "__typename": "App", "slug": "deploy-bot" } }
                    ],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                },
                "reviewDismissalAllowances": {
                    "nodes": [],
                    "pageInfo": { "hasNextPage": false, "endCursor": null }
                }
            }],
            "pageInfo": { "hasNextPage": false, "endCursor": null }
        } } }
    });

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let rules = channel.branch_protection_rules("acme", "widget").await.unwrap();

    assert_eq!(rules.len(), 1);
    let rule = &rules[0];
    assert_eq!(rule["pattern"], "main");
    // Connections are flattened into plain actor arrays.
    assert_eq!(
        rule["bypassPullRequestAllowances"],
        json!([{ "__typename": "Team", "combinedSlug": "acme/admins" }])
    );
    assert_eq!(rule["pushAllowances"].as_array().unwrap().len(), 2);
    assert_eq!(rule["bypassForcePushAllowances"], json!([]));
}

#[tokio::test]
async fn test_repository_id_resolution() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "id": "R_kgDOtest" } }
        })))
        .mount(&mock_server)
        .await;

    let channel = channel(&mock_server);
    let id = channel.repository_id("acme", "widget").await.unwrap();
    assert_eq!(id, "R_kgDOtest");
}
