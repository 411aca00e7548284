//! Circuit breaker tests.
//!
//! - half_open.rs: probe admission under real concurrency
//! - sharing.rs: one breaker guarding several pipelines
