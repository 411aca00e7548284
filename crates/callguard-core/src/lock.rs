//! A cancellable, one-holder-at-a-time async lock.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::Cancelled;

/// Exclusive lock for async code whose acquisition can be abandoned.
///
/// Unlike `tokio::sync::Mutex` it guards no data: it serializes sections of
/// work. Waiters are served in FIFO order.
///
/// ```rust
/// use callguard_core::{AsyncMutex, CancellationToken};
///
/// # futures::executor::block_on(async {
/// let mutex = AsyncMutex::new();
/// let token = CancellationToken::new();
///
/// let mut guard = mutex.acquire(&token).await.unwrap();
/// assert!(mutex.is_locked());
///
/// guard.release();
/// guard.release(); // no-op
/// assert!(!mutex.is_locked());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct AsyncMutex {
    semaphore: Arc<Semaphore>,
}

impl AsyncMutex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Waits for the lock, giving up when `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<AsyncMutexGuard, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if let Some(guard) = self.try_acquire() {
            return Ok(guard);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("async mutex contended, waiting");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => Ok(AsyncMutexGuard::new(permit)),
                // The semaphore is never closed.
                Err(_) => Err(Cancelled),
            },
        }
    }

    /// Takes the lock if it is free.
    pub fn try_acquire(&self) -> Option<AsyncMutexGuard> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(AsyncMutexGuard::new)
    }

    /// Returns `true` while some guard holds the lock.
    pub fn is_locked(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for AsyncMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped ownership of an [`AsyncMutex`].
///
/// Released either by [`release`](Self::release) or on drop, whichever
/// happens first. Releasing twice is a no-op.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct AsyncMutexGuard {
    permit: Option<OwnedSemaphorePermit>,
}

impl AsyncMutexGuard {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self {
            permit: Some(permit),
        }
    }

    /// Releases the lock.
    ///
    /// Returns `true` if this call released it, `false` if it was already
    /// released.
    pub fn release(&mut self) -> bool {
        self.permit.take().is_some()
    }

    /// Returns `true` until the guard has been released.
    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }
}
