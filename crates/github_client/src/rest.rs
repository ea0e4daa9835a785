//! REST channel: paginated reads with an in-run response cache.
//!
//! Idempotent GET responses are cached for the lifetime of the channel,
//! keyed by the request path including query string, so repeated reads of
//! the same resource (during diff validation and again during apply) do not
//! re-issue identical calls. The cache never outlives the run and is cleared
//! whenever a mutation goes through this channel.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use octocrab::Octocrab;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use crate::errors::Error;
use crate::rate_limit::RetryPolicy;

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;

/// Items requested per page. GitHub caps list endpoints at 100.
const PAGE_SIZE: usize = 100;

/// Upper bound on pages followed for a single listing. Prevents unbounded
/// memory growth against pathological endpoints.
const MAX_PAGES: usize = 100;

/// Default per-call network timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// REST channel over an authenticated [`Octocrab`] client.
pub struct RestChannel {
    client: Octocrab,
    retry: RetryPolicy,
    call_timeout: Duration,
    cache: Mutex<HashMap<String, Value>>,
}

impl std::fmt::Debug for RestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestChannel")
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl RestChannel {
    pub fn new(client: Octocrab, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Performs a cached, retried GET returning the response body as JSON.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        if let Some(hit) = self.cache_lookup(path) {
            trace!(path = path, "REST cache hit");
            return Ok(hit);
        }

        let value = self
            .retry
            .execute(&format!("GET {path}"), || self.get_once(path))
            .await?;

        self.cache_store(path, value.clone());
        Ok(value)
    }

    /// Fetches every page of a list endpoint that returns a bare JSON array.
    ///
    /// Pages are followed in order (`per_page`/`page` cursors) until a short
    /// page arrives; items are concatenated in arrival order. Each page
    /// participates in the response cache individually.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_all(&self, path: &str) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let page_path = with_page(path, page);
            let value = self.get(&page_path).await?;
            let page_items = value
                .as_array()
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("expected a JSON array from {page_path}"))
                })?
                .clone();
            let short = page_items.len() < PAGE_SIZE;
            items.extend(page_items);
            if short {
                return Ok(items);
            }
        }
        warn!(
            path = path,
            pages = MAX_PAGES,
            "Stopped following pagination at the page cap"
        );
        Ok(items)
    }

    /// Fetches every page of a list endpoint whose items live under `key`
    /// in a wrapper object (for example `{"total_count": n, "secrets": []}`).
    #[instrument(skip(self), fields(path = %path, key = %key))]
    pub async fn get_all_wrapped(&self, path: &str, key: &str) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let page_path = with_page(path, page);
            let value = self.get(&page_path).await?;
            let page_items = value
                .get(key)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "expected an array under '{key}' from {page_path}"
                    ))
                })?
                .clone();
            let short = page_items.len() < PAGE_SIZE;
            items.extend(page_items);
            if short {
                return Ok(items);
            }
        }
        warn!(
            path = path,
            pages = MAX_PAGES,
            "Stopped following pagination at the page cap"
        );
        Ok(items)
    }

    /// POST mutation returning the created resource.
    #[instrument(skip(self, payload), fields(path = %path))]
    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value, Error> {
        self.invalidate_cache();
        self.retry
            .execute(&format!("POST {path}"), || async {
                let call = self.client.post(path.to_string(), Some(payload));
                let result: Result<Value, octocrab::Error> = self.timed(path, call).await?;
                result.map_err(|e| classify_octocrab_error(path, e))
            })
            .await
    }

    /// PATCH mutation returning the updated resource.
    #[instrument(skip(self, payload), fields(path = %path))]
    pub async fn patch(&self, path: &str, payload: &Value) -> Result<Value, Error> {
        self.invalidate_cache();
        self.retry
            .execute(&format!("PATCH {path}"), || async {
                let call = self.client.patch(path.to_string(), Some(payload));
                let result: Result<Value, octocrab::Error> = self.timed(path, call).await?;
                result.map_err(|e| classify_octocrab_error(path, e))
            })
            .await
    }

    /// PUT mutation for endpoints that respond with an empty body.
    #[instrument(skip(self, payload), fields(path = %path))]
    pub async fn put(&self, path: &str, payload: Option<&Value>) -> Result<(), Error> {
        self.invalidate_cache();
        self.retry
            .execute(&format!("PUT {path}"), || async {
                let call = async {
                    let response = self
                        .client
                        ._put(path.to_string(), payload)
                        .await
                        .map_err(|e| classify_octocrab_error(path, e))?;
                    octocrab::map_github_error(response)
                        .await
                        .map_err(|e| classify_octocrab_error(path, e))?;
                    Ok(())
                };
                self.timed(path, call).await?
            })
            .await
    }

    /// DELETE mutation for endpoints that respond with an empty body.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        self.invalidate_cache();
        self.retry
            .execute(&format!("DELETE {path}"), || async {
                let call = async {
                    let response = self
                        .client
                        ._delete(path.to_string(), None::<&()>)
                        .await
                        .map_err(|e| classify_octocrab_error(path, e))?;
                    octocrab::map_github_error(response)
                        .await
                        .map_err(|e| classify_octocrab_error(path, e))?;
                    Ok(())
                };
                self.timed(path, call).await?
            })
            .await
    }

    async fn get_once(&self, path: &str) -> Result<Value, Error> {
        let call = self.client.get(path.to_string(), None::<&()>);
        let result: Result<Value, octocrab::Error> = self.timed(path, call).await?;
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let mut classified = classify_octocrab_error(path, e);
                if let Error::RateLimited { reset_in_secs: hint @ None } = &mut classified {
                    *hint = self.reset_hint().await;
                }
                Err(classified)
            }
        }
    }

    /// Applies the per-call timeout to a network future. A call that exceeds
    /// the timeout is a retryable failure, not a fatal one.
    async fn timed<T>(
        &self,
        context: &str,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T, Error> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| Error::Transport(format!("{context} timed out")))
    }

    /// Asks `/rate_limit` how long until the core limit resets.
    ///
    /// The rate-limit endpoint itself does not count against the limit. Any
    /// failure here just means no hint.
    async fn reset_hint(&self) -> Option<u64> {
        let result: Result<Value, octocrab::Error> =
            self.client.get("/rate_limit", None::<&()>).await;
        let value = result.ok()?;
        let reset = value
            .pointer("/resources/core/reset")
            .and_then(Value::as_u64)?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        Some(reset.saturating_sub(now).max(1))
    }

    fn cache_lookup(&self, path: &str) -> Option<Value> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(path).cloned())
    }

    fn cache_store(&self, path: &str, value: Value) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path.to_string(), value);
        }
    }

    /// Drops every cached GET response. Called on any mutation so later
    /// reads observe GitHub's new state.
    fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            if !cache.is_empty() {
                debug!(entries = cache.len(), "Invalidating REST response cache");
                cache.clear();
            }
        }
    }
}

/// Appends the pagination cursor to a path that may already carry a query.
fn with_page(path: &str, page: usize) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}per_page={PAGE_SIZE}&page={page}")
}

/// Maps an [`octocrab::Error`] onto the channel error taxonomy.
///
/// GitHub reports both primary and secondary rate limits as 403/429 with a
/// recognizable message; those become [`Error::RateLimited`] so the retry
/// policy backs off instead of failing fast.
pub(crate) fn classify_octocrab_error(context: &str, e: octocrab::Error) -> Error {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let message = source.message.to_lowercase();
            if message.contains("rate limit") || message.contains("abuse detection") {
                Error::RateLimited {
                    reset_in_secs: None,
                }
            } else if message.contains("not found") {
                Error::NotFound(context.to_string())
            } else if message.contains("bad credentials")
                || message.contains("requires authentication")
            {
                Error::AuthError(source.message.clone())
            } else {
                Error::ApiError(format!("{context}: {}", source.message))
            }
        }
        other => {
            let rendered = other.to_string();
            let transport = rendered.contains("timed out")
                || rendered.contains("connection")
                || rendered.contains("channel closed");
            if transport {
                Error::Transport(format!("{context}: {rendered}"))
            } else {
                Error::ApiError(format!("{context}: {rendered}"))
            }
        }
    }
}
