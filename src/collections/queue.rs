//! Interlocked Queue
//!
//! FIFO used by the sliding input buffer of a socket.

use crossbeam::queue::SegQueue;

/// Lock-free multi-producer FIFO queue
///
/// Thin wrapper over `crossbeam::queue::SegQueue` exposing the operations the
/// streaming buffer needs.
pub struct InterlockedQueue<T> {
    inner: SegQueue<T>,
}

impl<T> InterlockedQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Append a value at the tail
    pub fn enqueue(&self, value: T) {
        self.inner.push(value);
    }

    /// Remove the value at the head, if any
    pub fn dequeue(&self) -> Option<T> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every queued value
    pub fn clear(&self) {
        while self.inner.pop().is_some() {}
    }
}

impl<T> Default for InterlockedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
