//! Shared atomic counters.
//!
//! The set workload's add-key counter and the register workload's uid counter
//! are the only cross-process coordination in the harness. They are injected
//! explicitly (`Arc`-shared) rather than living as hidden globals, and values
//! are allocated optimistically: a uid is consumed even if the database call
//! that carries it ultimately fails.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn new(start: i64) -> Self {
        Counter(AtomicI64::new(start))
    }

    /// Returns the next value. Strictly increasing across all holders of the
    /// same counter.
    pub fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}
