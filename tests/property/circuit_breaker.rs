//! Property tests for the circuit breaker policy.
//!
//! Invariants tested:
//! - Opens exactly when consecutive failures reach the threshold
//! - A success resets the failure streak
//! - Rejects calls without invoking the operation while open

use callguard::circuitbreaker::{CircuitBreakerPolicy, CircuitState};
use callguard::{operation, CancellationToken, Policy};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

async fn fail(breaker: &CircuitBreakerPolicy, calls: &AtomicU32) -> bool {
    let op = operation(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>("boom") }
    });
    breaker
        .execute(op, CancellationToken::new())
        .await
        .unwrap_err()
        .is_circuit_open()
}

async fn succeed(breaker: &CircuitBreakerPolicy) {
    let op = operation(|_| async { Ok::<_, &str>(()) });
    breaker.execute(op, CancellationToken::new()).await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: the breaker opens on the threshold-th consecutive failure
    #[test]
    fn opens_exactly_at_threshold(
        threshold in 1u32..=20,
        extra_calls in 1u32..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let breaker = CircuitBreakerPolicy::new(threshold, Duration::from_secs(60));
            let calls = AtomicU32::new(0);

            for n in 1..=threshold {
                prop_assert!(!fail(&breaker, &calls).await);
                let expected = if n < threshold { CircuitState::Closed } else { CircuitState::Open };
                prop_assert_eq!(breaker.state(), expected);
            }

            for _ in 0..extra_calls {
                prop_assert!(fail(&breaker, &calls).await, "open breaker must reject");
            }
            prop_assert_eq!(calls.load(Ordering::SeqCst), threshold);

            Ok(())
        })?;
    }

    /// Property: interleaved successes keep the breaker closed
    #[test]
    fn success_resets_the_streak(
        threshold in 2u32..=10,
        rounds in 1usize..=10,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let breaker = CircuitBreakerPolicy::new(threshold, Duration::from_secs(60));
            let calls = AtomicU32::new(0);

            for _ in 0..rounds {
                for _ in 0..threshold - 1 {
                    fail(&breaker, &calls).await;
                }
                succeed(&breaker).await;
                prop_assert_eq!(breaker.metrics().consecutive_failures, 0);
            }

            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            Ok(())
        })?;
    }
}
