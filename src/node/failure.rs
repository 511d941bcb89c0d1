//! Node failure policies
//!
//! A policy is asked once per I/O failure whether the node should now be
//! considered dead.

use std::time::{Duration, Instant};

use crate::config::FailurePolicyConfig;

/// Decides whether a connection failure takes the whole node down
pub trait FailurePolicy: Send {
    fn should_fail(&mut self) -> bool;
}

/// Every failure fails the node
#[derive(Debug, Default, Clone, Copy)]
pub struct FailImmediately;

impl FailurePolicy for FailImmediately {
    fn should_fail(&mut self) -> bool {
        true
    }
}

/// Fails the node after `failure_threshold` failures, each within
/// `reset_after` of the previous one
///
/// A failure that comes later than `reset_after` after the previous one
/// starts the count over at 1. Reaching the threshold fails the node and
/// clears the count and the window immediately.
#[derive(Debug, Clone)]
pub struct ThrottlingFailurePolicy {
    failure_threshold: u32,
    reset_after: Duration,
    fail_counter: u32,
    last_failed: Option<Instant>,
}

impl ThrottlingFailurePolicy {
    pub fn new(failure_threshold: u32, reset_after: Duration) -> Self {
        Self {
            failure_threshold,
            reset_after,
            fail_counter: 0,
            last_failed: None,
        }
    }

    /// Failures counted in the current window
    pub fn fail_counter(&self) -> u32 {
        self.fail_counter
    }

    /// `should_fail` with an explicit clock
    pub fn should_fail_at(&mut self, now: Instant) -> bool {
        match self.last_failed {
            None => {
                tracing::trace!("Setting fail counter to 1");
                self.fail_counter = 1;
            }
            Some(last) => {
                let diff = now.saturating_duration_since(last);
                tracing::trace!(
                    "Last fail was {:?} ago with counter {}",
                    diff,
                    self.fail_counter
                );
                if diff <= self.reset_after {
                    self.fail_counter += 1;
                } else {
                    self.fail_counter = 1;
                }
            }
        }

        self.last_failed = Some(now);

        if self.fail_counter == self.failure_threshold {
            tracing::debug!("Failure threshold {} reached, node will fail", self.failure_threshold);
            self.last_failed = None;
            self.fail_counter = 0;
            return true;
        }

        tracing::trace!(
            "Current counter is {}, threshold not reached",
            self.fail_counter
        );
        false
    }
}

impl FailurePolicy for ThrottlingFailurePolicy {
    fn should_fail(&mut self) -> bool {
        self.should_fail_at(Instant::now())
    }
}

impl FailurePolicyConfig {
    /// Fresh policy instance for one node
    pub fn create(&self) -> Box<dyn FailurePolicy> {
        match *self {
            FailurePolicyConfig::Immediate => Box::new(FailImmediately),
            FailurePolicyConfig::Throttling {
                failure_threshold,
                reset_after_ms,
            } => Box::new(ThrottlingFailurePolicy::new(
                failure_threshold,
                Duration::from_millis(reset_after_ms),
            )),
        }
    }
}
