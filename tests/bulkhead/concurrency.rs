//! Parallelism limits under real concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use callguard::bulkhead::BulkheadPolicy;
use callguard::{operation, CancellationToken, Policy, PolicyError};

use super::ConcurrencyTracker;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_never_exceeds_the_limit() {
    let bulkhead = BulkheadPolicy::new(4, 100);
    let tracker = Arc::new(ConcurrencyTracker::default());
    let mut handles = Vec::new();

    for _ in 0..50 {
        let bulkhead = bulkhead.clone();
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let op = operation(move |_| {
                let tracker = Arc::clone(&tracker);
                async move {
                    tracker.enter();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    tracker.exit();
                    Ok::<_, &str>(())
                }
            });
            bulkhead.execute(op, CancellationToken::new()).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(tracker.peak() <= 4, "peak was {}", tracker.peak());
    assert_eq!(bulkhead.available_slots(), 4);
    assert_eq!(bulkhead.queued(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admitted_plus_queued_is_bounded() {
    let (max_parallel, max_queue) = (3, 5);
    let bulkhead = BulkheadPolicy::new(max_parallel, max_queue);
    let admitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let release = CancellationToken::new();
    let mut handles = Vec::new();

    for _ in 0..40 {
        let bulkhead = bulkhead.clone();
        let admitted = Arc::clone(&admitted);
        let rejected = Arc::clone(&rejected);
        let release = release.clone();
        handles.push(tokio::spawn(async move {
            let op = operation(move |_| {
                let release = release.clone();
                async move {
                    release.cancelled().await;
                    Ok::<_, &str>(())
                }
            });
            match bulkhead.execute(op, CancellationToken::new()).await {
                Ok(()) => admitted.fetch_add(1, Ordering::SeqCst),
                Err(PolicyError::BulkheadFull { .. }) => rejected.fetch_add(1, Ordering::SeqCst),
                Err(other) => panic!("unexpected error: {other}"),
            };
        }));
    }

    // Wait until every caller is either running, queued or rejected.
    while bulkhead.max_parallel() - bulkhead.available_slots() + bulkhead.queued()
        + rejected.load(Ordering::SeqCst)
        < 40
    {
        let in_flight =
            bulkhead.max_parallel() - bulkhead.available_slots() + bulkhead.queued();
        assert!(in_flight <= max_parallel + max_queue);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    release.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), max_parallel + max_queue);
    assert_eq!(rejected.load(Ordering::SeqCst), 40 - max_parallel - max_queue);
}
