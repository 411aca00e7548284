//! Composed stack stress tests

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard::bulkhead::BulkheadPolicy;
use callguard::circuitbreaker::CircuitBreakerPolicy;
use callguard::retry::RetryPolicy;
use callguard::timeout::TimeoutPolicy;
use callguard::{operation, CancellationToken, PolicyStack};

use super::ConcurrencyTracker;

/// Test: Thousands of callers through retry, breaker, bulkhead and timeout
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_full_stack() {
    let bulkhead = BulkheadPolicy::new(16, 4096);
    let breaker = Arc::new(CircuitBreakerPolicy::new(10_000, Duration::from_secs(1)));
    let succeeded = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let stack = Arc::new(
        PolicyStack::<u64, io::Error>::builder()
            .name("stress")
            .policy(
                RetryPolicy::<io::Error>::builder()
                    .max_attempts(3)
                    .jitter_backoff(Duration::from_millis(1), Duration::from_millis(5))
                    .retry_transient()
                    .build(),
            )
            .policy(Arc::clone(&breaker))
            .policy(bulkhead.clone())
            .policy(TimeoutPolicy::new(Duration::from_millis(50)))
            .on_succeeded({
                let succeeded = Arc::clone(&succeeded);
                move |_| {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
            })
            .on_failed({
                let failed = Arc::clone(&failed);
                move |_, _| {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build(),
    );

    let tracker = ConcurrencyTracker::new();
    let start = Instant::now();
    let mut handles = vec![];

    for i in 0..4_000u64 {
        let stack = Arc::clone(&stack);
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let attempts = AtomicUsize::new(0);
            let op = operation(|_| {
                let tracker = Arc::clone(&tracker);
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                async move {
                    tracker.enter();
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    tracker.exit();
                    // Every seventh caller fails its first attempt.
                    if i % 7 == 0 && attempt == 0 {
                        Err(io::Error::from(io::ErrorKind::ConnectionReset))
                    } else {
                        Ok(i)
                    }
                }
            });
            stack.execute(op, CancellationToken::new()).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), i as u64);
    }

    println!("4000 callers through a full stack in {:?}", start.elapsed());
    println!("Peak concurrency: {}", tracker.peak());

    assert!(tracker.peak() <= 16);
    assert_eq!(succeeded.load(Ordering::Relaxed), 4_000);
    assert_eq!(failed.load(Ordering::Relaxed), 0);
    assert_eq!(bulkhead.available_slots(), 16);
    assert!(!breaker.is_open());
}

/// Test: Cancelling half of the callers mid-flight leaves shared policies clean
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_cancelled_stack_calls() {
    let bulkhead = BulkheadPolicy::new(8, 2048);
    let breaker = Arc::new(CircuitBreakerPolicy::new(5, Duration::from_secs(30)));
    let cancelled = Arc::new(AtomicUsize::new(0));

    let stack = Arc::new(
        PolicyStack::<(), io::Error>::builder()
            .policy(Arc::clone(&breaker))
            .policy(bulkhead.clone())
            .on_cancelled({
                let cancelled = Arc::clone(&cancelled);
                move |_| {
                    cancelled.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build(),
    );

    let mut handles = vec![];
    for i in 0..2_000u64 {
        let stack = Arc::clone(&stack);
        handles.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            if i % 2 == 0 {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_micros(i % 300)).await;
                    cancel.cancel();
                });
            }

            let op = operation(|token: CancellationToken| async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_millis(2)) => {}
                }
                Ok::<_, io::Error>(())
            });
            let _ = stack.execute(op, cancel).await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("Cancelled calls: {}", cancelled.load(Ordering::Relaxed));
    assert_eq!(bulkhead.available_slots(), 8);
    assert_eq!(bulkhead.queued(), 0);
    assert!(!breaker.is_open(), "cancellation must never trip the breaker");
}
