//! GraphQL channel: templated queries with cursor pagination.
//!
//! Branch-protection rules and their allowance-actor lists are only fully
//! expressible through the GraphQL API. Connections are drained by following
//! `pageInfo.hasNextPage`/`endCursor` until exhausted; nodes are merged in
//! arrival order.

use std::time::Duration;

use octocrab::Octocrab;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rate_limit::RetryPolicy;

#[cfg(test)]
#[path = "graphql_tests.rs"]
mod tests;

/// Page size for connection traversal.
const CONNECTION_PAGE_SIZE: u32 = 100;

/// Default per-call network timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// The allowance-actor connections carried by a branch-protection rule.
pub const ALLOWANCE_CONNECTIONS: [&str; 4] = [
    "bypassPullRequestAllowances",
    "bypassForcePushAllowances",
    "pushAllowances",
    "reviewDismissalAllowances",
];

const ACTOR_FRAGMENT: &str = r#"
        actor {
          __typename
          ... on App { slug }
          ... on Team { combinedSlug }
          ... on User { login }
        }
"#;

/// GraphQL channel over an authenticated [`Octocrab`] client.
pub struct GraphQlChannel {
    client: Octocrab,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl std::fmt::Debug for GraphQlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlChannel")
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl GraphQlChannel {
    pub fn new(client: Octocrab, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Runs one query with variables, retried under the shared policy.
    ///
    /// GraphQL transports errors in-band: a 200 response may still carry an
    /// `errors` array, which is mapped onto the channel error taxonomy here.
    /// A call exceeding the timeout counts as a retryable failure.
    #[instrument(skip(self, query, variables))]
    pub async fn query(&self, query: &str, variables: Value) -> Result<Value, Error> {
        let payload = json!({ "query": query, "variables": variables });
        self.retry
            .execute("graphql query", || async {
                let call = self.client.graphql(&payload);
                let result: Result<Value, octocrab::Error> =
                    tokio::time::timeout(self.call_timeout, call)
                        .await
                        .map_err(|_| Error::Transport("graphql call timed out".to_string()))?;
                let value =
                    result.map_err(|e| crate::rest::classify_octocrab_error("graphql", e))?;
                check_graphql_errors(&value)?;
                Ok(value)
            })
            .await
    }

    /// Drains a cursor-paginated connection.
    ///
    /// `build` produces the request for a given cursor; `pointer` is the
    /// JSON-pointer path from the response root to the connection object
    /// (the object carrying `nodes` and `pageInfo`).
    pub async fn paginate<F>(&self, build: F, pointer: &str) -> Result<Vec<Value>, Error>
    where
        F: Fn(Option<&str>) -> (String, Value),
    {
        let mut nodes = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (query, variables) = build(cursor.as_deref());
            let response = self.query(&query, variables).await?;
            let connection = response.pointer(pointer).ok_or_else(|| {
                Error::InvalidResponse(format!("missing connection at {pointer}"))
            })?;
            let page = connection
                .get("nodes")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("connection at {pointer} has no nodes"))
                })?;
            nodes.extend(page.iter().cloned());

            let page_info = connection.get("pageInfo").cloned().unwrap_or(Value::Null);
            let has_next = page_info
                .get("hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_next {
                return Ok(nodes);
            }
            cursor = page_info
                .get("endCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                // hasNextPage without a cursor would loop forever.
                return Err(Error::InvalidResponse(format!(
                    "connection at {pointer} reported another page without an endCursor"
                )));
            }
        }
    }

    /// Fetches every branch-protection rule of a repository.
    ///
    /// Each returned rule node carries its GraphQL node `id`, the scalar
    /// flags, and the four allowance connections flattened into plain arrays
    /// of actor objects (drained past the first page where needed).
    #[instrument(skip(self), fields(owner = %owner, repo = %repo))]
    pub async fn branch_protection_rules(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Value>, Error> {
        let rules = self
            .paginate(
                |cursor| {
                    (
                        branch_protection_query(),
                        json!({ "owner": owner, "name": repo, "cursor": cursor }),
                    )
                },
                "/data/repository/branchProtectionRules",
            )
            .await?;

        let mut complete = Vec::with_capacity(rules.len());
        for mut rule in rules {
            self.drain_allowances(&mut rule).await?;
            complete.push(rule);
        }
        debug!(
            owner = owner,
            repo = repo,
            count = complete.len(),
            "Fetched branch protection rules"
        );
        Ok(complete)
    }

    /// Replaces each allowance connection on `rule` with a flat array of
    /// actor objects, following nested cursors where the first page was not
    /// enough.
    async fn drain_allowances(&self, rule: &mut Value) -> Result<(), Error> {
        let rule_id = rule
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("branch protection rule without id".into()))?;

        for connection_name in ALLOWANCE_CONNECTIONS {
            let Some(connection) = rule.get(connection_name).cloned() else {
                continue;
            };
            let mut actors: Vec<Value> = connection
                .get("nodes")
                .and_then(Value::as_array)
                .map(|nodes| {
                    nodes
                        .iter()
                        .filter_map(|node| node.get("actor").cloned())
                        .collect()
                })
                .unwrap_or_default();

            let has_next = connection
                .pointer("/pageInfo/hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if has_next {
                let start = connection
                    .pointer("/pageInfo/endCursor")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let more = self
                    .paginate(
                        |cursor| {
                            let effective = cursor.map(str::to_string).or_else(|| start.clone());
                            (
                                allowance_continuation_query(connection_name),
                                json!({ "id": rule_id, "cursor": effective }),
                            )
                        },
                        &format!("/data/node/{connection_name}"),
                    )
                    .await?;
                actors.extend(more.into_iter().filter_map(|node| node.get("actor").cloned()));
            }

            rule[connection_name] = Value::Array(actors);
        }
        Ok(())
    }

    /// Resolves a repository to its GraphQL node id.
    pub async fn repository_id(&self, owner: &str, repo: &str) -> Result<String, Error> {
        let response = self
            .query(
                "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { id } }",
                json!({ "owner": owner, "name": repo }),
            )
            .await?;
        pointer_string(&response, "/data/repository/id")
            .ok_or_else(|| Error::NotFound(format!("repository {owner}/{repo}")))
    }

    /// Resolves a team slug within an organization to its node id.
    pub async fn team_id(&self, org: &str, slug: &str) -> Result<String, Error> {
        let response = self
            .query(
                "query($org: String!, $slug: String!) { organization(login: $org) { team(slug: $slug) { id } } }",
                json!({ "org": org, "slug": slug }),
            )
            .await?;
        pointer_string(&response, "/data/organization/team/id")
            .ok_or_else(|| Error::NotFound(format!("team {org}/{slug}")))
    }

    /// Resolves a user login to its node id.
    pub async fn user_id(&self, login: &str) -> Result<String, Error> {
        let response = self
            .query(
                "query($login: String!) { user(login: $login) { id } }",
                json!({ "login": login }),
            )
            .await?;
        pointer_string(&response, "/data/user/id")
            .ok_or_else(|| Error::NotFound(format!("user {login}")))
    }

    /// Creates a branch-protection rule from a prepared mutation input.
    pub async fn create_branch_protection_rule(&self, input: Value) -> Result<Value, Error> {
        let response = self
            .query(
                "mutation($input: CreateBranchProtectionRuleInput!) { createBranchProtectionRule(input: $input) { branchProtectionRule { id pattern } } }",
                json!({ "input": input }),
            )
            .await?;
        response
            .pointer("/data/createBranchProtectionRule/branchProtectionRule")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("create mutation returned no rule".into()))
    }

    /// Updates a branch-protection rule in place.
    pub async fn update_branch_protection_rule(&self, input: Value) -> Result<Value, Error> {
        let response = self
            .query(
                "mutation($input: UpdateBranchProtectionRuleInput!) { updateBranchProtectionRule(input: $input) { branchProtectionRule { id pattern } } }",
                json!({ "input": input }),
            )
            .await?;
        response
            .pointer("/data/updateBranchProtectionRule/branchProtectionRule")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("update mutation returned no rule".into()))
    }

    /// Deletes a branch-protection rule by node id.
    pub async fn delete_branch_protection_rule(&self, rule_id: &str) -> Result<(), Error> {
        self.query(
            "mutation($input: DeleteBranchProtectionRuleInput!) { deleteBranchProtectionRule(input: $input) { clientMutationId } }",
            json!({ "input": { "branchProtectionRuleId": rule_id } }),
        )
        .await?;
        Ok(())
    }
}

/// Surfaces in-band GraphQL errors as channel errors.
fn check_graphql_errors(response: &Value) -> Result<(), Error> {
    let Some(errors) = response.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let first = &errors[0];
    let message = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown GraphQL error");
    let error_type = first.get("type").and_then(Value::as_str).unwrap_or("");
    if error_type == "RATE_LIMITED" {
        return Err(Error::RateLimited {
            reset_in_secs: None,
        });
    }
    if error_type == "NOT_FOUND" {
        return Err(Error::NotFound(message.to_string()));
    }
    Err(Error::ApiError(format!("graphql: {message}")))
}

fn pointer_string(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

/// The full branch-protection-rule retrieval query.
fn branch_protection_query() -> String {
    format!(
        r#"query($owner: String!, $name: String!, $cursor: String) {{
  repository(owner: $owner, name: $name) {{
    branchProtectionRules(first: 50, after: $cursor) {{
      nodes {{
        id
        pattern
        allowsDeletions
        allowsForcePushes
        blocksCreations
        dismissesStaleReviews
        isAdminEnforced
        lockAllowsFetchAndMerge
        lockBranch
        requireLastPushApproval
        requiredApprovingReviewCount
        requiredDeploymentEnvironments
        requiredStatusCheckContexts
        requiresApprovingReviews
        requiresCodeOwnerReviews
        requiresCommitSignatures
        requiresConversationResolution
        requiresDeployments
        requiresLinearHistory
        requiresStatusChecks
        requiresStrictStatusChecks
        restrictsPushes
        restrictsReviewDismissals
        bypassPullRequestAllowances(first: {page}) {{
          nodes {{ {actor} }}
          pageInfo {{ hasNextPage endCursor }}
        }}
        bypassForcePushAllowances(first: {page}) {{
          nodes {{ {actor} }}
          pageInfo {{ hasNextPage endCursor }}
        }}
        pushAllowances(first: {page}) {{
          nodes {{ {actor} }}
          pageInfo {{ hasNextPage endCursor }}
        }}
        reviewDismissalAllowances(first: {page}) {{
          nodes {{ {actor} }}
          pageInfo {{ hasNextPage endCursor }}
        }}
      }}
      pageInfo {{ hasNextPage endCursor }}
    }}
  }}
}}"#,
        page = CONNECTION_PAGE_SIZE,
        actor = ACTOR_FRAGMENT
    )
}

/// Continuation query for one allowance connection of one rule.
fn allowance_continuation_query(connection_name: &str) -> String {
    format!(
        r#"query($id: ID!, $cursor: String) {{
  node(id: $id) {{
    ... on BranchProtectionRule {{
      {connection_name}(first: {page}, after: $cursor) {{
        nodes {{ {actor} }}
        pageInfo {{ hasNextPage endCursor }}
      }}
    }}
  }}
}}"#,
        page = CONNECTION_PAGE_SIZE,
        actor = ACTOR_FRAGMENT
    )
}
