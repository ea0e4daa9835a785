//! Tests for the retry policy.

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.base_delay_secs, 2);
    assert_eq!(policy.max_delay_secs, 60);
}

#[test]
fn test_should_retry_rate_limited() {
    let policy = RetryPolicy::new(3, 1);
    let error = Error::RateLimited {
        reset_in_secs: None,
    };
    assert!(policy.should_retry(0, &error));
    assert!(policy.should_retry(2, &error));
    assert!(!policy.should_retry(3, &error)); // at max
}

#[test]
fn test_should_not_retry_auth_error() {
    let policy = RetryPolicy::new(3, 1);
    let error = Error::AuthError("invalid token".to_string());
    assert!(!policy.should_retry(0, &error));
}

#[test]
fn test_delay_exponential_backoff() {
    let policy = RetryPolicy::new(5, 1);
    let error = Error::Transport("timed out".to_string());

    assert_eq!(policy.delay_for(0, &error), Duration::from_secs(1)); // 1 * 2^0
    assert_eq!(policy.delay_for(1, &error), Duration::from_secs(2)); // 1 * 2^1
    assert_eq!(policy.delay_for(2, &error), Duration::from_secs(4)); // 1 * 2^2
    assert_eq!(policy.delay_for(3, &error), Duration::from_secs(8)); // 1 * 2^3
}

#[test]
fn test_delay_capped_at_max() {
    let policy = RetryPolicy {
        max_retries: 10,
        base_delay_secs: 1,
        max_delay_secs: 10,
    };
    let error = Error::Transport("timed out".to_string());

    assert_eq!(policy.delay_for(5, &error), Duration::from_secs(10)); // 32 capped to 10
    assert_eq!(policy.delay_for(8, &error), Duration::from_secs(10)); // 256 capped to 10
}

#[test]
fn test_delay_uses_reset_hint() {
    let policy = RetryPolicy::new(5, 1);
    let error = Error::RateLimited {
        reset_in_secs: Some(30),
    };

    assert_eq!(policy.delay_for(0, &error), Duration::from_secs(30));
    assert_eq!(policy.delay_for(3, &error), Duration::from_secs(30));
}

#[test]
fn test_delay_reset_hint_capped() {
    let policy = RetryPolicy {
        max_retries: 5,
        base_delay_secs: 1,
        max_delay_secs: 10,
    };
    let error = Error::RateLimited {
        reset_in_secs: Some(120),
    };

    assert_eq!(policy.delay_for(0, &error), Duration::from_secs(10));
}

#[tokio::test]
async fn test_execute_succeeds_first_try() {
    let policy = RetryPolicy::new(3, 0);
    let result = policy
        .execute("test_op", || async { Ok::<_, Error>(42) })
        .await;
    assert_eq!(result.unwrap(), 42);
}

#[tokio::test]
async fn test_execute_succeeds_after_retries() {
    let policy = RetryPolicy::new(3, 0);
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = policy
        .execute("test_op", move || {
            let counter = counter_clone.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(Error::Transport("connection reset".to_string()))
                } else {
                    Ok(99)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 99);
    assert_eq!(counter.load(Ordering::SeqCst), 3); // initial + 2 retries
}

#[tokio::test]
async fn test_execute_non_retryable_fails_immediately() {
    let policy = RetryPolicy::new(3, 0);
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result: Result<(), Error> = policy
        .execute("test_op", move || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::NotFound("/orgs/missing".to_string()))
            }
        })
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(counter.load(Ordering::SeqCst), 1); // only one attempt
}

#[tokio::test]
async fn test_execute_retries_exhausted() {
    let policy = RetryPolicy::new(2, 0);
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result: Result<(), Error> = policy
        .execute("test_op", move || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("connection reset".to_string()))
            }
        })
        .await;

    match result {
        Err(Error::RetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 3); // 1 initial + 2 retries
        }
        other => panic!("Expected RetriesExhausted, got: {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}
