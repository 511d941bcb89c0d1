//! Recovery timer
//!
//! Single-shot, re-armable timer on its own thread. The server pool arms it
//! when a node dies; the callback decides whether to arm it again.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Result;

#[derive(Default)]
struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

pub(crate) struct RecoveryTimer {
    shared: Arc<TimerShared>,
}

impl RecoveryTimer {
    /// Timer without a thread; `spawn` starts it
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState::default()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Start the timer thread; `callback` runs on it at each expiry
    pub(crate) fn spawn<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        let worker = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&worker, callback))?;
        Ok(())
    }

    /// Fire once after `delay`, replacing any pending deadline
    pub(crate) fn schedule(&self, delay: Duration) {
        let mut state = self.shared.state.lock();
        state.deadline = Some(Instant::now() + delay);
        self.shared.wake.notify_one();
    }

    pub(crate) fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        state.deadline = None;
        self.shared.wake.notify_one();
    }
}

impl Drop for RecoveryTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F: Fn()>(shared: &TimerShared, callback: F) {
    let mut state = shared.state.lock();

    loop {
        if state.shutdown {
            return;
        }

        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                state.deadline = None;
                drop(state);
                callback();
                state = shared.state.lock();
            }
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
        }
    }
}
