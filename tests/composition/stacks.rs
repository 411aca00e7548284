//! Realistic stacks built from every policy.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callguard::bulkhead::BulkheadPolicy;
use callguard::circuitbreaker::{CircuitBreakerPolicy, CircuitState};
use callguard::debounce::DebouncePolicy;
use callguard::retry::RetryPolicy;
use callguard::timeout::TimeoutPolicy;
use callguard::{operation, CancellationToken, PipelineEvent, PolicyLayer, PolicyStack};
use tower::{Layer, ServiceExt};

struct Dependencies {
    breaker: Arc<CircuitBreakerPolicy>,
    bulkhead: BulkheadPolicy,
}

fn presence_stack(
    events: &Arc<Mutex<Vec<&'static str>>>,
) -> (PolicyStack<String, io::Error>, Dependencies) {
    let breaker = Arc::new(
        CircuitBreakerPolicy::builder()
            .name("presence")
            .failure_threshold(3)
            .break_duration(Duration::from_secs(30))
            .build(),
    );
    let bulkhead = BulkheadPolicy::new(4, 8);
    let events = Arc::clone(events);

    let stack = PolicyStack::builder()
        .name("presence")
        .policy(DebouncePolicy::new(Duration::from_millis(50)))
        .policy(
            RetryPolicy::<io::Error>::builder()
                .max_attempts(3)
                .jitter_backoff(Duration::from_millis(10), Duration::from_millis(100))
                .retry_transient()
                .build(),
        )
        .policy(Arc::clone(&breaker))
        .policy(bulkhead.clone())
        .policy(TimeoutPolicy::new(Duration::from_millis(200)))
        .on_event(move |event: &PipelineEvent| {
            use callguard::core::PolicyEvent;
            events.lock().unwrap().push(event.event_type());
        })
        .build();

    (stack, Dependencies { breaker, bulkhead })
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_inside_the_stack() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (stack, deps) = presence_stack(&events);

    let calls = AtomicU32::new(0);
    let op = operation(|_| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            } else {
                Ok("online".to_string())
            }
        }
    });

    let status = stack.execute(op, CancellationToken::new()).await.unwrap();

    assert_eq!(status, "online");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(deps.breaker.state(), CircuitState::Closed);
    assert_eq!(deps.bulkhead.available_slots(), 4);
    assert_eq!(*events.lock().unwrap(), vec!["succeeded"]);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (stack, deps) = presence_stack(&events);

    let calls = AtomicU32::new(0);
    let op = operation(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<String, _>(io::Error::from(io::ErrorKind::PermissionDenied)) }
    });

    let err = stack.execute(op, CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        err.operation_error().map(io::Error::kind),
        Some(io::ErrorKind::PermissionDenied)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(deps.breaker.metrics().consecutive_failures, 1);
    assert_eq!(*events.lock().unwrap(), vec!["failed"]);
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_trip_the_shared_breaker() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (stack, deps) = presence_stack(&events);

    let hang = operation(|_| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, io::Error>("never".to_string())
    });

    // Three timed-out attempts reach the failure threshold.
    let err = stack
        .execute(Arc::clone(&hang), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(deps.breaker.state(), CircuitState::Open);

    let err = stack.execute(hang, CancellationToken::new()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(*events.lock().unwrap(), vec!["failed", "failed"]);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_debounce_reports_cancelled() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (stack, _deps) = presence_stack(&events);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let op = operation(|_| async { Ok::<_, io::Error>("unused".to_string()) });
    let err = stack.execute(op, cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(*events.lock().unwrap(), vec!["cancelled"]);
}

#[tokio::test(start_paused = true)]
async fn tower_service_behind_the_stack() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (stack, _deps) = presence_stack(&events);

    let lookups = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&lookups);
    let svc = PolicyLayer::new(stack).layer(tower::service_fn(move |user: String| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(io::Error::from(io::ErrorKind::TimedOut))
            } else {
                Ok(format!("{user}: away"))
            }
        }
    }));

    let status = svc.oneshot("grace".to_string()).await.unwrap();

    assert_eq!(status, "grace: away");
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}
