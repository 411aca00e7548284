//! Property tests for the retry policy.
//!
//! Invariants tested:
//! - Never exceeds max_attempts
//! - Stops on the first success
//! - Retry predicate is respected

use callguard::retry::RetryPolicy;
use callguard::{operation, CancellationToken, Policy};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

/// A cloneable error type for testing
#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Retryable,
    Fatal,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Retryable => write!(f, "retryable error"),
            TestError::Fatal => write!(f, "fatal error"),
        }
    }
}

impl std::error::Error for TestError {}

fn policy(max_attempts: u32) -> RetryPolicy<TestError> {
    RetryPolicy::<TestError>::builder()
        .max_attempts(max_attempts)
        .fixed_backoff(Duration::from_millis(1))
        .retry_on(|err| err.operation_error() == Some(&TestError::Retryable))
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: retry never exceeds max_attempts
    #[test]
    fn retry_respects_max_attempts(max_attempts in 1u32..=10) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let op = operation(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Retryable) }
            });

            let result = policy(max_attempts).execute(op, CancellationToken::new()).await;
            prop_assert!(result.is_err(), "Should fail after exhausting retries");
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);

            Ok(())
        })?;
    }

    /// Property: success on attempt N stops retrying
    #[test]
    fn retry_stops_on_success(
        max_attempts in 1u32..=10,
        succeed_on in 1u32..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let op = operation(|_| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt >= succeed_on {
                        Ok(attempt)
                    } else {
                        Err(TestError::Retryable)
                    }
                }
            });

            let result = policy(max_attempts).execute(op, CancellationToken::new()).await;
            if succeed_on <= max_attempts {
                prop_assert_eq!(result.ok(), Some(succeed_on));
                prop_assert_eq!(calls.load(Ordering::SeqCst), succeed_on);
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            }

            Ok(())
        })?;
    }

    /// Property: a failure the predicate rejects is surfaced after one attempt
    #[test]
    fn retry_predicate_is_respected(
        max_attempts in 1u32..=10,
        fatal_on in 1u32..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = AtomicU32::new(0);
            let op = operation(|_| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt >= fatal_on {
                        Err::<(), _>(TestError::Fatal)
                    } else {
                        Err(TestError::Retryable)
                    }
                }
            });

            let err = policy(max_attempts)
                .execute(op, CancellationToken::new())
                .await
                .unwrap_err();

            let expected_calls = fatal_on.min(max_attempts);
            prop_assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
            if fatal_on <= max_attempts {
                prop_assert_eq!(err.into_operation_error(), Some(TestError::Fatal));
            } else {
                prop_assert_eq!(err.into_operation_error(), Some(TestError::Retryable));
            }

            Ok(())
        })?;
    }
}
