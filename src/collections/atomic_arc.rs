//! Atomic Arc
//!
//! Shared reference that can be replaced while readers are using it.

use std::fmt;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};
use std::sync::Arc;

use crossbeam::epoch::{self, Atomic, Owned};

/// An `Arc<T>` slot with lock-free `load` and atomic `swap`
///
/// Readers always get either the old or the new value in full, never a mix.
/// The replaced `Arc` is released once every pinned reader has moved on.
pub struct AtomicArc<T: ?Sized> {
    slot: Atomic<Arc<T>>,
}

unsafe impl<T: ?Sized + Send + Sync> Send for AtomicArc<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for AtomicArc<T> {}

impl<T: ?Sized> AtomicArc<T> {
    pub fn new(value: Arc<T>) -> Self {
        Self {
            slot: Atomic::new(value),
        }
    }

    /// Clone the current value
    pub fn load(&self) -> Arc<T> {
        let guard = epoch::pin();
        let current = self.slot.load(Acquire, &guard);

        // SAFETY: the slot is never null and `current` is protected by `guard`.
        unsafe { current.deref() }.clone()
    }

    /// Replace the current value, returning the previous one
    pub fn swap(&self, value: Arc<T>) -> Arc<T> {
        let guard = epoch::pin();
        let previous = self.slot.swap(Owned::new(value), AcqRel, &guard);

        // SAFETY: `previous` is unlinked and still protected by `guard`; its box
        // is reclaimed after all current readers unpin.
        unsafe {
            let old = previous.deref().clone();
            guard.defer_destroy(previous);
            old
        }
    }

    /// Replace the current value, dropping the previous one
    pub fn store(&self, value: Arc<T>) {
        drop(self.swap(value));
    }
}

impl<T: ?Sized> Drop for AtomicArc<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no concurrent readers remain.
        unsafe {
            let current = self.slot.load(Relaxed, epoch::unprotected());
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for AtomicArc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicArc").field(&self.load()).finish()
    }
}
