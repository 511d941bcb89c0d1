//! Stack Tests

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use memcluster::collections::{AtomicArc, InterlockedStack};

// =============================================================================
// Single-threaded Tests
// =============================================================================

#[test]
fn test_stack_is_lifo() {
    let stack = InterlockedStack::new();
    stack.push(1);
    stack.push(2);
    stack.push(3);

    assert_eq!(stack.try_pop(), Some(3));
    assert_eq!(stack.try_pop(), Some(2));
    assert_eq!(stack.try_pop(), Some(1));
    assert_eq!(stack.try_pop(), None);
    assert!(stack.is_empty());
}

#[test]
fn test_stack_drain_empties() {
    let stack = InterlockedStack::new();
    for i in 0..10 {
        stack.push(i);
    }

    let mut drained = stack.drain();
    drained.sort();

    assert_eq!(drained, (0..10).collect::<Vec<_>>());
    assert!(stack.is_empty());
}

#[test]
fn test_stack_drops_remaining_items() {
    let marker = Arc::new(());
    {
        let stack = InterlockedStack::new();
        for _ in 0..5 {
            stack.push(Arc::clone(&marker));
        }
        assert_eq!(Arc::strong_count(&marker), 6);
    }
    assert_eq!(Arc::strong_count(&marker), 1);
}

// =============================================================================
// Concurrent Tests
// =============================================================================

#[test]
fn test_stack_concurrent_push_pop_loses_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2_000;

    let stack = Arc::new(InterlockedStack::new());

    let pushers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    stack.push(t * PER_THREAD + i);
                }
            })
        })
        .collect();

    // poppers run alongside the pushers and keep what they take
    let poppers: Vec<_> = (0..THREADS / 2)
        .map(|_| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let mut taken = Vec::new();
                for _ in 0..PER_THREAD {
                    if let Some(value) = stack.try_pop() {
                        taken.push(value);
                    }
                }
                taken
            })
        })
        .collect();

    for pusher in pushers {
        pusher.join().unwrap();
    }

    let mut seen = Vec::new();
    for popper in poppers {
        seen.extend(popper.join().unwrap());
    }
    seen.extend(stack.drain());

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(seen.len(), THREADS * PER_THREAD, "an item was lost or duplicated");
    assert_eq!(unique.len(), THREADS * PER_THREAD);
}

// =============================================================================
// AtomicArc Tests
// =============================================================================

#[test]
fn test_atomic_arc_swap_returns_previous() {
    let cell = AtomicArc::new(Arc::new(1));
    let previous = cell.swap(Arc::new(2));

    assert_eq!(*previous, 1);
    assert_eq!(*cell.load(), 2);
}

#[test]
fn test_atomic_arc_releases_values() {
    let first = Arc::new(String::from("first"));
    let second = Arc::new(String::from("second"));

    {
        let cell = AtomicArc::new(Arc::clone(&first));
        cell.store(Arc::clone(&second));
        let loaded = cell.load();
        assert_eq!(loaded.as_str(), "second");
    }

    assert_eq!(Arc::strong_count(&first), 1);
    assert_eq!(Arc::strong_count(&second), 1);
}

#[test]
fn test_atomic_arc_concurrent_readers_see_whole_values() {
    let cell = Arc::new(AtomicArc::new(Arc::new(vec![0u32; 16])));

    let writer = {
        let cell = Arc::clone(&cell);
        thread::spawn(move || {
            for generation in 1..500u32 {
                cell.store(Arc::new(vec![generation; 16]));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = cell.load();
                    assert!(snapshot.iter().all(|v| *v == snapshot[0]));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
