//! Interlocked Stack
//!
//! Treiber stack used as the free list of idle connections.

use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crossbeam::epoch::{self, Atomic, Owned};

/// Lock-free LIFO stack
///
/// Push and pop are compare-and-swap retry loops on the head pointer. Popped
/// nodes are destroyed once no pinned thread can still observe them.
pub struct InterlockedStack<T> {
    head: Atomic<Node<T>>,
}

struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

// Values are moved in and out whole; no `&T` is ever handed to another thread.
unsafe impl<T: Send> Send for InterlockedStack<T> {}
unsafe impl<T: Send> Sync for InterlockedStack<T> {}

impl<T> InterlockedStack<T> {
    /// Create an empty stack
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Push a value on top of the stack
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });

        let guard = epoch::pin();

        loop {
            let head = self.head.load(Relaxed, &guard);
            node.next.store(head, Relaxed);

            match self
                .head
                .compare_exchange(head, node, Release, Relaxed, &guard)
            {
                Ok(_) => return,
                Err(err) => node = err.new,
            }
        }
    }

    /// Pop the top value, or `None` if the stack is empty
    pub fn try_pop(&self) -> Option<T> {
        let guard = epoch::pin();

        loop {
            let head = self.head.load(Acquire, &guard);

            // SAFETY: `head` was loaded under `guard`, so it is not reclaimed yet.
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Relaxed, &guard);

            if self
                .head
                .compare_exchange(head, next, Relaxed, Relaxed, &guard)
                .is_ok()
            {
                // SAFETY: the CAS unlinked `head`, so this thread is the only one
                // that will move the value out. The node itself is freed later.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(ManuallyDrop::into_inner(ptr::read(&node.value)));
                }
            }
        }
    }

    /// True if the stack had no items at the time of the call
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Acquire, &guard).is_null()
    }

    /// Pop every value, oldest push last
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.try_pop() {
            items.push(item);
        }
        items
    }
}

impl<T> Default for InterlockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for InterlockedStack<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}
