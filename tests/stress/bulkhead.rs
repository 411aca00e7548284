//! Bulkhead stress tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use callguard::bulkhead::BulkheadPolicy;
use callguard::{operation, CancellationToken, Policy};
use tokio::time::sleep;

use super::ConcurrencyTracker;

/// Test: Thousands of queued calls
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_large_queue() {
    let bulkhead = BulkheadPolicy::new(10, 1000);
    let tracker = ConcurrencyTracker::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = vec![];

    for _ in 0..1000 {
        let bulkhead = bulkhead.clone();
        let tracker = Arc::clone(&tracker);
        let processed = Arc::clone(&processed);
        handles.push(tokio::spawn(async move {
            let op = operation(|_| {
                let tracker = Arc::clone(&tracker);
                let processed = Arc::clone(&processed);
                async move {
                    tracker.enter();
                    sleep(Duration::from_millis(10)).await;
                    processed.fetch_add(1, Ordering::Relaxed);
                    tracker.exit();
                    Ok::<_, ()>(())
                }
            });
            bulkhead.execute(op, CancellationToken::new()).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    println!("1000 queued calls with max_parallel 10");
    println!("Completed in: {:?}", start.elapsed());
    println!("Peak concurrency: {}", tracker.peak());

    assert!(tracker.peak() <= 10, "Should not exceed max_parallel");
    assert_eq!(processed.load(Ordering::Relaxed), 1000);
    assert_eq!(bulkhead.available_slots(), 10);
    assert_eq!(bulkhead.queued(), 0);
}

/// Test: Rapid slot acquisition and release
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_slot_churn() {
    let bulkhead = BulkheadPolicy::new(4, 64);
    let completed = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = vec![];

    for _ in 0..64 {
        let bulkhead = bulkhead.clone();
        let completed = Arc::clone(&completed);
        let rejected = Arc::clone(&rejected);
        handles.push(tokio::spawn(async move {
            for _ in 0..2_000 {
                let op = operation(|_| async { Ok::<_, ()>(()) });
                match bulkhead.execute(op, CancellationToken::new()).await {
                    Ok(()) => completed.fetch_add(1, Ordering::Relaxed),
                    Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
                };
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let completed = completed.load(Ordering::Relaxed);
    let rejected = rejected.load(Ordering::Relaxed);
    println!("128k churned calls in {:?}", start.elapsed());
    println!("Completed: {}, rejected: {}", completed, rejected);

    assert_eq!(completed + rejected, 128_000);
    assert_eq!(bulkhead.available_slots(), 4, "All slots must be returned");
    assert_eq!(bulkhead.queued(), 0, "Queue must drain");
}

/// Test: Waiters cancelled at random points never leak slots or queue places
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_cancellation_storm() {
    let bulkhead = BulkheadPolicy::new(8, 32);
    let mut handles = vec![];

    for i in 0..2_000u64 {
        let bulkhead = bulkhead.clone();
        handles.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let canceller = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_micros(i % 500)).await;
                    cancel.cancel();
                })
            };

            let op = operation(|token: CancellationToken| async move {
                token.cancelled().await;
                Ok::<_, ()>(())
            });
            let _ = bulkhead.execute(op, cancel).await;
            canceller.await.unwrap();
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(bulkhead.available_slots(), 8);
    assert_eq!(bulkhead.queued(), 0);
}
