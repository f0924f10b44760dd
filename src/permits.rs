//! Counting permits bounding concurrent streaming transfers.
//!
//! The pool is constructed once per process and passed down the call chain,
//! so tests can instantiate independent bounds instead of sharing a
//! module-level singleton. Permits are released by RAII: dropping a
//! [`Permit`] always returns its slot, success or failure.

use std::sync::{Condvar, Mutex};

#[derive(Debug)]
pub struct PermitPool {
    capacity: usize,
    available: Mutex<usize>,
    signal: Condvar,
}

impl PermitPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            available: Mutex::new(capacity.max(1)),
            signal: Condvar::new(),
        }
    }

    /// Blocks until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while *available == 0 {
            available = self
                .signal
                .wait(available)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *available -= 1;
        Permit { pool: self }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free (for instrumentation and tests).
    pub fn available(&self) -> usize {
        *self
            .available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *available += 1;
        self.signal.notify_one();
    }
}

#[derive(Debug)]
pub struct Permit<'a> {
    pool: &'a PermitPool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
