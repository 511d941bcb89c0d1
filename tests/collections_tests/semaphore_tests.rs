//! Semaphore Tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use memcluster::collections::Semaphore;

#[test]
fn test_semaphore_starts_full() {
    let semaphore = Semaphore::new(3);
    assert_eq!(semaphore.available(), 3);
    assert_eq!(semaphore.max(), 3);
}

#[test]
fn test_semaphore_times_out_when_exhausted() {
    let semaphore = Semaphore::new(1);
    assert!(semaphore.try_acquire());

    let start = Instant::now();
    assert!(!semaphore.acquire_timeout(Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(45));
}

#[test]
fn test_semaphore_release_wakes_waiter() {
    let semaphore = Arc::new(Semaphore::new(1));
    assert!(semaphore.try_acquire());

    let waiter = {
        let semaphore = Arc::clone(&semaphore);
        thread::spawn(move || semaphore.acquire_timeout(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    semaphore.release();

    assert!(waiter.join().unwrap());
    assert_eq!(semaphore.available(), 0);
}

#[test]
fn test_semaphore_ignores_extra_release() {
    let semaphore = Semaphore::new(2);
    semaphore.release();
    assert_eq!(semaphore.available(), 2);
}

#[test]
fn test_semaphore_balance_under_contention() {
    const MAX: usize = 4;

    let semaphore = Arc::new(Semaphore::new(MAX));
    let held = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..16)
        .map(|i| {
            let semaphore = Arc::clone(&semaphore);
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for round in 0..200 {
                    if !semaphore.acquire_timeout(Duration::from_millis(10)) {
                        continue;
                    }
                    let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    if (i + round) % 3 == 0 {
                        thread::yield_now();
                    }

                    held.fetch_sub(1, Ordering::SeqCst);
                    semaphore.release();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= MAX);
    assert_eq!(semaphore.available(), MAX);
}
