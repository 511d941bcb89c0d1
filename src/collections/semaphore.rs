//! Counting Semaphore
//!
//! Bounds the number of sockets a pool may have outstanding.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counting semaphore with a timed wait
///
/// `permits` never exceeds `max`: a release with every permit already
/// returned is ignored and logged.
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
    max: usize,
}

impl Semaphore {
    /// Create a semaphore with all `max` permits available
    pub fn new(max: usize) -> Self {
        Self {
            permits: Mutex::new(max),
            available: Condvar::new(),
            max,
        }
    }

    /// Take a permit, waiting up to `timeout`. Returns false on timeout.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.permits.lock();

        while *permits == 0 {
            if self.available.wait_until(&mut permits, deadline).timed_out() {
                if *permits == 0 {
                    return false;
                }
                break;
            }
        }

        *permits -= 1;
        true
    }

    /// Take a permit without waiting
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return a permit and wake one waiter
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        if *permits >= self.max {
            tracing::error!("Semaphore released more often than acquired (max {})", self.max);
            return;
        }
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    /// Total number of permits
    pub fn max(&self) -> usize {
        self.max
    }
}
