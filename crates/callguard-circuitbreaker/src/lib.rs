//! Consecutive-failure circuit breaker for callguard pipelines.
//!
//! A breaker protects a failing dependency by refusing calls for a while
//! instead of piling more load on it.
//!
//! ## States
//!
//! - **Closed** (initial): calls pass through. Each failure increments a
//!   consecutive-failure counter and each success resets it. Reaching
//!   `failure_threshold` trips the breaker.
//! - **Open**: calls are rejected with [`PolicyError::CircuitOpen`] without
//!   invoking the operation. Once `break_duration` has elapsed the next call
//!   moves the breaker to HalfOpen.
//! - **HalfOpen**: exactly one probe call runs at a time; concurrent callers
//!   are rejected with `half_open: true`. A successful probe closes the
//!   breaker, a failed one trips it again.
//!
//! Cancellation is neither success nor failure: the state is left untouched
//! and a cancelled probe frees the probe slot for the next caller.
//!
//! ## Example
//!
//! ```rust
//! use callguard_circuitbreaker::{CircuitBreakerPolicy, CircuitState};
//! use callguard_core::{operation, CancellationToken, Policy};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreakerPolicy::builder()
//!     .name("inventory")
//!     .failure_threshold(2)
//!     .break_duration(Duration::from_secs(30))
//!     .on_state_transition(|from, to| println!("inventory: {from:?} -> {to:?}"))
//!     .build();
//!
//! for _ in 0..2 {
//!     let failing = operation(|_| async { Err::<(), _>("unavailable") });
//!     let _ = breaker.execute(failing, CancellationToken::new()).await;
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let never_called = operation(|_| async { Ok::<_, &str>(()) });
//! let err = breaker.execute(never_called, CancellationToken::new()).await.unwrap_err();
//! assert!(err.is_circuit_open());
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tracing`: logs state transitions and rejections
//! - `metrics`: call counters, transition counters, a state gauge and a
//!   duration histogram
//! - `serde`: enables serialization of [`CircuitState`] and [`CircuitMetrics`]

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use callguard_core::{CancellationToken, Operation, OperationFuture, Policy, PolicyError};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use parking_lot::Mutex;
#[cfg(feature = "metrics")]
use std::sync::Once;
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use crate::circuit::{AdmittedAs, Admission, Circuit};
use crate::config::CircuitBreakerConfig;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::CircuitBreakerPolicyBuilder;
pub use events::CircuitBreakerEvent;

mod circuit;
mod config;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A shared circuit breaker.
///
/// Cloning is cheap and every clone observes and drives the same state, so
/// one instance can guard a dependency across many concurrent calls.
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    shared: Arc<Shared>,
}

struct Shared {
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    probe_in_flight: AtomicBool,
}

/// Clears the probe slot when the probe finishes, fails, is cancelled, or is
/// dropped mid-flight.
struct ProbeGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Permit<'a> {
    admitted_as: AdmittedAs,
    _probe: Option<ProbeGuard<'a>>,
}

enum Outcome {
    Success,
    Failure,
}

impl CircuitBreakerPolicy {
    /// Returns a builder.
    pub fn builder() -> CircuitBreakerPolicyBuilder {
        CircuitBreakerPolicyBuilder::new()
    }

    /// Creates a breaker with the given threshold and break duration.
    ///
    /// # Panics
    ///
    /// Panics if `failure_threshold` is 0.
    pub fn new(failure_threshold: u32, break_duration: Duration) -> Self {
        Self::builder()
            .failure_threshold(failure_threshold)
            .break_duration(break_duration)
            .build()
    }

    pub(crate) fn from_config(config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker by outcome"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
                );
                describe_histogram!(
                    "circuitbreaker_call_duration_seconds",
                    "Duration of calls through the circuit breaker"
                );
            });
        }

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            shared: Arc::new(Shared {
                circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
                state_atomic,
                probe_in_flight: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// The instance name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Consecutive failures that trip the breaker.
    pub fn failure_threshold(&self) -> u32 {
        self.shared.config.failure_threshold
    }

    /// How long the breaker stays open.
    pub fn break_duration(&self) -> Duration {
        self.shared.config.break_duration
    }

    /// Returns the current state without taking the lock.
    ///
    /// An Open breaker whose break duration has elapsed still reports Open
    /// until the next call moves it to HalfOpen.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the breaker is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a consistent snapshot of the breaker.
    pub fn metrics(&self) -> CircuitMetrics {
        self.shared.circuit.lock().metrics(&self.shared.config)
    }

    /// Trips the breaker now, restarting the break duration.
    pub fn force_open(&self) {
        let mut events = Vec::new();
        self.shared
            .circuit
            .lock()
            .force_open(&self.shared.config, &mut events);
        self.emit(events);
    }

    /// Closes the breaker and clears the failure counter.
    pub fn reset(&self) {
        let mut events = Vec::new();
        self.shared
            .circuit
            .lock()
            .reset(&self.shared.config, &mut events);
        self.emit(events);
    }

    /// Returns `"healthy"` when closed, `"degraded"` when half-open and
    /// `"unhealthy"` when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }

    fn emit(&self, events: Vec<CircuitBreakerEvent>) {
        for event in &events {
            self.shared.config.event_listeners.emit(event);
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, CircuitState> {
        let shared = &*self.shared;
        let config = &shared.config;
        let mut events = Vec::new();

        let decision = {
            let mut circuit = shared.circuit.lock();
            match circuit.admit(config, &mut events) {
                Admission::Permitted => Ok(Permit {
                    admitted_as: AdmittedAs::Closed,
                    _probe: None,
                }),
                Admission::ProbeCandidate => {
                    if shared
                        .probe_in_flight
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        Ok(Permit {
                            admitted_as: AdmittedAs::Probe,
                            _probe: Some(ProbeGuard {
                                flag: &shared.probe_in_flight,
                            }),
                        })
                    } else {
                        Err(CircuitState::HalfOpen)
                    }
                }
                Admission::Rejected(state) => Err(state),
            }
        };

        match &decision {
            Ok(permit) => {
                let state = match permit.admitted_as {
                    AdmittedAs::Closed => CircuitState::Closed,
                    AdmittedAs::Probe => CircuitState::HalfOpen,
                };
                events.push(CircuitBreakerEvent::CallPermitted {
                    policy_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state,
                });

                #[cfg(feature = "tracing")]
                if permit.admitted_as == AdmittedAs::Probe {
                    debug!(policy = %config.name, "Admitting half-open probe");
                }
            }
            Err(state) => {
                events.push(CircuitBreakerEvent::CallRejected {
                    policy_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: *state,
                });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "policy" => config.name.clone(), "outcome" => "rejected")
                    .increment(1);

                #[cfg(feature = "tracing")]
                warn!(policy = %config.name, state = state.as_str(), "Call rejected by circuit breaker");
            }
        }

        self.emit(events);
        decision
    }

    fn record(&self, permit: &Permit<'_>, outcome: Outcome, _duration: Duration) {
        let config = &self.shared.config;
        let mut events = Vec::new();
        {
            let mut circuit = self.shared.circuit.lock();
            match outcome {
                Outcome::Success => circuit.record_success(permit.admitted_as, config, &mut events),
                Outcome::Failure => circuit.record_failure(permit.admitted_as, config, &mut events),
            }
        }

        #[cfg(feature = "metrics")]
        {
            let label = match outcome {
                Outcome::Success => "success",
                Outcome::Failure => "failure",
            };
            counter!("circuitbreaker_calls_total", "policy" => config.name.clone(), "outcome" => label)
                .increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "policy" => config.name.clone())
                .record(_duration.as_secs_f64());
        }

        self.emit(events);
    }
}

impl<T, E> Policy<T, E> for CircuitBreakerPolicy
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

            let permit = self.acquire().map_err(|state| PolicyError::CircuitOpen {
                name: self.shared.config.name.clone(),
                half_open: state == CircuitState::HalfOpen,
            })?;

            let start = tokio::time::Instant::now();
            let result = operation(cancel.clone()).await;

            match &result {
                Ok(_) => self.record(&permit, Outcome::Success, start.elapsed()),
                Err(_) if cancel.is_cancelled() => {}
                Err(_) => self.record(&permit, Outcome::Failure, start.elapsed()),
            }

            drop(permit);
            result
        })
    }
}
