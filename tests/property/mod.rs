//! Property-based tests for callguard policies.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold across all policies.

pub mod circuit_breaker;
pub mod retry;
