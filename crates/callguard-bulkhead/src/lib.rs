//! Bulkhead policy for callguard pipelines.
//!
//! A bulkhead bounds how many calls run at once. Calls beyond `max_parallel`
//! wait in a queue of at most `max_queue` entries; anything beyond that is
//! rejected with [`PolicyError::BulkheadFull`] without invoking the
//! operation. With `max_queue == 0` a busy bulkhead rejects immediately.
//!
//! Slots and queue reservations are RAII guards, so they are released however
//! a call ends: success, failure, cancellation, or its future being dropped.
//! Running plus waiting calls never exceed `max_parallel + max_queue`.
//!
//! ## Example
//!
//! ```rust
//! use callguard_bulkhead::BulkheadPolicy;
//! use callguard_core::{operation, CancellationToken, Policy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bulkhead = BulkheadPolicy::builder()
//!     .name("thumbnails")
//!     .max_parallel(2)
//!     .max_queue(8)
//!     .build();
//!
//! let render = operation(|_| async { Ok::<_, std::io::Error>(vec![0u8; 16]) });
//! let bytes = bulkhead.execute(render, CancellationToken::new()).await.unwrap();
//! assert_eq!(bytes.len(), 16);
//! assert_eq!(bulkhead.available_slots(), 2);
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tracing`: logs queuing and rejections
//! - `metrics`: call counters by outcome, running and queued gauges, a
//!   duration histogram

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy, PolicyError};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use crate::config::BulkheadConfig;

pub use config::BulkheadPolicyBuilder;
pub use events::BulkheadEvent;

mod config;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A shared concurrency limiter.
///
/// Clones share the same slots and queue.
#[derive(Clone)]
pub struct BulkheadPolicy {
    shared: Arc<Shared>,
}

struct Shared {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    queued: AtomicUsize,
}

/// A place in the wait queue, given back on drop.
struct QueueReservation<'a> {
    queued: &'a AtomicUsize,
}

impl<'a> QueueReservation<'a> {
    /// Reserves a place unless `max_queue` places are already taken.
    fn try_reserve(queued: &'a AtomicUsize, max_queue: usize) -> Option<Self> {
        queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max_queue).then_some(current + 1)
            })
            .ok()
            .map(|_| Self { queued })
    }
}

impl Drop for QueueReservation<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BulkheadPolicy {
    /// Returns a builder.
    pub fn builder() -> BulkheadPolicyBuilder {
        BulkheadPolicyBuilder::new()
    }

    /// Creates a bulkhead with the given limits and default settings.
    ///
    /// # Panics
    ///
    /// Panics if `max_parallel` is 0.
    pub fn new(max_parallel: usize, max_queue: usize) -> Self {
        Self::builder()
            .max_parallel(max_parallel)
            .max_queue(max_queue)
            .build()
    }

    pub(crate) fn from_config(config: BulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "bulkhead_calls_total",
                    "Total number of calls through the bulkhead by outcome"
                );
                describe_gauge!(
                    "bulkhead_concurrent_calls",
                    "Number of calls currently running inside the bulkhead"
                );
                describe_gauge!(
                    "bulkhead_queued_calls",
                    "Number of calls currently waiting for a bulkhead slot"
                );
                describe_histogram!(
                    "bulkhead_call_duration_seconds",
                    "Duration of calls admitted by the bulkhead"
                );
            });
        }

        Self {
            shared: Arc::new(Shared {
                semaphore: Arc::new(Semaphore::new(config.max_parallel)),
                queued: AtomicUsize::new(0),
                config,
            }),
        }
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Maximum number of calls running at once.
    pub fn max_parallel(&self) -> usize {
        self.shared.config.max_parallel
    }

    /// Maximum number of waiting calls.
    pub fn max_queue(&self) -> usize {
        self.shared.config.max_queue
    }

    /// Free execution slots right now.
    pub fn available_slots(&self) -> usize {
        self.shared.semaphore.available_permits()
    }

    /// Calls waiting for a slot right now.
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Calls holding a slot right now.
    pub fn running(&self) -> usize {
        self.max_parallel()
            .saturating_sub(self.shared.semaphore.available_permits())
    }

    fn reject<E>(&self) -> PolicyError<E> {
        let config = &self.shared.config;
        config.event_listeners.emit(&BulkheadEvent::CallRejected {
            policy_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            max_parallel: config.max_parallel,
            max_queue: config.max_queue,
        });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "policy" => config.name.clone(), "outcome" => "rejected")
            .increment(1);

        #[cfg(feature = "tracing")]
        warn!(
            policy = %config.name,
            max_parallel = config.max_parallel,
            max_queue = config.max_queue,
            "Bulkhead full, rejecting call"
        );

        PolicyError::BulkheadFull {
            max_parallel: config.max_parallel,
            max_queue: config.max_queue,
        }
    }

    async fn acquire<E>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, PolicyError<E>> {
        let shared = &*self.shared;

        if let Ok(permit) = Arc::clone(&shared.semaphore).try_acquire_owned() {
            return Ok(permit);
        }

        let reservation = QueueReservation::try_reserve(&shared.queued, shared.config.max_queue)
            .ok_or_else(|| self.reject::<E>())?;

        let queued_calls = self.queued();
        shared.config.event_listeners.emit(&BulkheadEvent::CallQueued {
            policy_name: shared.config.name.clone(),
            timestamp: std::time::Instant::now(),
            queued_calls,
        });

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queued_calls", "policy" => shared.config.name.clone())
            .set(queued_calls as f64);

        #[cfg(feature = "tracing")]
        debug!(policy = %shared.config.name, queued_calls, "Waiting for a bulkhead slot");

        let permit: Result<OwnedSemaphorePermit, PolicyError<E>> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PolicyError::Cancelled),
            // The semaphore is never closed.
            permit = Arc::clone(&shared.semaphore).acquire_owned() => permit.map_err(|_| self.reject()),
        };

        drop(reservation);

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queued_calls", "policy" => shared.config.name.clone())
            .set(self.queued() as f64);

        permit
    }
}

impl<T, E> Policy<T, E> for BulkheadPolicy
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        cancel: CancellationToken,
    ) -> OperationFuture<'a, T, E> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(PolicyError::Cancelled);
            }

            let permit = self.acquire::<E>(&cancel).await?;
            let config = &self.shared.config;

            let concurrent_calls = self.running();
            config.event_listeners.emit(&BulkheadEvent::CallPermitted {
                policy_name: config.name.clone(),
                timestamp: std::time::Instant::now(),
                concurrent_calls,
            });

            #[cfg(feature = "metrics")]
            {
                counter!("bulkhead_calls_total", "policy" => config.name.clone(), "outcome" => "permitted")
                    .increment(1);
                gauge!("bulkhead_concurrent_calls", "policy" => config.name.clone())
                    .set(concurrent_calls as f64);
            }

            let start = tokio::time::Instant::now();
            let result = operation(cancel).await;
            drop(permit);
            let duration = start.elapsed();

            let event = match &result {
                Ok(_) => BulkheadEvent::CallFinished {
                    policy_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    duration,
                },
                Err(_) => BulkheadEvent::CallFailed {
                    policy_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    duration,
                },
            };
            config.event_listeners.emit(&event);

            #[cfg(feature = "metrics")]
            {
                let outcome = if result.is_ok() { "finished" } else { "failed" };
                counter!("bulkhead_calls_total", "policy" => config.name.clone(), "outcome" => outcome)
                    .increment(1);
                histogram!("bulkhead_call_duration_seconds", "policy" => config.name.clone())
                    .record(duration.as_secs_f64());
                gauge!("bulkhead_concurrent_calls", "policy" => config.name.clone())
                    .set(self.running() as f64);
            }

            result
        })
    }
}
