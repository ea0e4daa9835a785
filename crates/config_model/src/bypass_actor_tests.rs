//! Tests for the bypass-actor string format.

use super::*;
use serde_json::json;

#[test]
fn test_parse_role() {
    let actor = BypassActor::parse("#admin").unwrap();
    assert_eq!(actor.kind, ActorKind::Role("admin".to_string()));
    assert_eq!(actor.scope, None);
}

#[test]
fn test_parse_team_with_scope() {
    let actor = BypassActor::parse("@StewardTest/committers:pull_request").unwrap();
    assert_eq!(
        actor.kind,
        ActorKind::Team {
            org: "StewardTest".to_string(),
            slug: "committers".to_string(),
        }
    );
    assert_eq!(actor.scope, Some(BypassScope::PullRequest));
}

#[test]
fn test_parse_user() {
    let actor = BypassActor::parse("@octocat").unwrap();
    assert_eq!(actor.kind, ActorKind::User("octocat".to_string()));
}

#[test]
fn test_parse_app_with_always_scope() {
    let actor = BypassActor::parse("deploy-bot:always").unwrap();
    assert_eq!(actor.kind, ActorKind::App("deploy-bot".to_string()));
    assert_eq!(actor.scope, Some(BypassScope::Always));
}

#[test]
fn test_round_trip_display() {
    for input in [
        "#admin",
        "#maintain:always",
        "@octocat",
        "@StewardTest/committers:pull_request",
        "@acme/platform",
        "deploy-bot",
        "renovate:pull_request",
    ] {
        let actor = BypassActor::parse(input).unwrap();
        assert_eq!(actor.to_string(), input, "round trip failed for {input}");
    }
}

#[test]
fn test_parse_rejects_malformed_actors() {
    for input in ["", "#", "@", "@a/b/c", "@/slug", "@org/", "bad/slug", "w@t"] {
        assert!(
            BypassActor::parse(input).is_err(),
            "expected '{input}' to be rejected"
        );
    }
}

#[test]
fn test_from_graphql_team_round_trips_to_string() {
    let node = json!({ "__typename": "Team", "combinedSlug": "StewardTest/committers" });
    let actor = BypassActor::from_graphql_node(&node).unwrap();
    assert_eq!(actor.to_string(), "@StewardTest/committers");

    // The on-disk form with a scope resolves back to the identical string.
    let scoped = actor.with_scope(BypassScope::PullRequest);
    assert_eq!(scoped.to_string(), "@StewardTest/committers:pull_request");
    let reparsed = BypassActor::parse(&scoped.to_string()).unwrap();
    assert_eq!(reparsed, scoped);
}

#[test]
fn test_from_graphql_user_and_app() {
    let user = BypassActor::from_graphql_node(&json!({
        "__typename": "User", "login": "octocat"
    }))
    .unwrap();
    assert_eq!(user.to_string(), "@octocat");

    let app = BypassActor::from_graphql_node(&json!({
        "__typename": "App", "slug": "deploy-bot"
    }))
    .unwrap();
    assert_eq!(app.to_string(), "deploy-bot");
}

#[test]
fn test_from_graphql_rejects_unknown_type() {
    let node = json!({ "__typename": "Mannequin", "login": "ghost" });
    assert!(BypassActor::from_graphql_node(&node).is_err());
}

#[test]
fn test_repository_role_tables_are_inverse() {
    for name in ["read", "maintain", "write", "admin"] {
        let id = repository_role_id(name).unwrap();
        assert_eq!(repository_role_name(id), Some(name));
    }
    assert_eq!(repository_role_id("owner"), None);
    assert_eq!(repository_role_name(3), None);
}
