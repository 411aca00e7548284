//! Stress tests for callguard policies
//!
//! ## What We Test
//!
//! - **High volume**: Hundreds of thousands of calls through one policy
//! - **High concurrency**: Thousands of concurrent callers
//! - **State consistency**: Counters and slots balance after the storm
//! - **Cancellation storms**: Callers abandoning work at random points

pub mod bulkhead;
pub mod circuitbreaker;
pub mod composition;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Utility: Track peak concurrent operations
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
