//! Core infrastructure for callguard.
//!
//! This crate holds what every policy crate shares:
//!
//! - [`Policy`] and [`Operation`]: the contract a policy implements and the
//!   shape of the work it wraps.
//! - [`PolicyError`]: the single error type a pipeline surfaces.
//! - [`EventListeners`] and [`FnListener`]: the hook system behind builder
//!   methods like `on_retry` and `on_state_transition`.
//! - [`AsyncMutex`], [`JitterBackoff`] and [`is_transient`]: small primitives
//!   the policies and their callers lean on.
//!
//! Cancellation is explicit: a [`CancellationToken`] is threaded to every
//! point where a policy suspends.

pub mod error;
pub mod events;
pub mod jitter;
pub mod lock;
pub mod policy;
pub mod transient;

pub use error::{Cancelled, PolicyError};
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, PolicyEvent};
pub use jitter::JitterBackoff;
pub use lock::{AsyncMutex, AsyncMutexGuard};
pub use policy::{operation, policy_operation, Operation, OperationFuture, Policy};
pub use transient::{is_transient, is_transient_error};

pub use tokio_util::sync::CancellationToken;
