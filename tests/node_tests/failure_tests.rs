//! Failure Policy Tests

use std::time::{Duration, Instant};

use memcluster::config::FailurePolicyConfig;
use memcluster::node::{FailImmediately, FailurePolicy, ThrottlingFailurePolicy};

#[test]
fn test_immediate_policy_fails_first_error() {
    let mut policy = FailImmediately;
    assert!(policy.should_fail());
    assert!(policy.should_fail());
}

#[test]
fn test_throttling_fails_on_third_error_within_window() {
    let mut policy = ThrottlingFailurePolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();

    assert!(!policy.should_fail_at(start));
    assert!(!policy.should_fail_at(start + Duration::from_millis(300)));
    assert!(policy.should_fail_at(start + Duration::from_millis(600)));

    // the count starts over after a failure
    assert_eq!(policy.fail_counter(), 0);
    assert!(!policy.should_fail_at(start + Duration::from_millis(700)));
}

#[test]
fn test_throttling_resets_when_errors_are_spaced_out() {
    let mut policy = ThrottlingFailurePolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();

    assert!(!policy.should_fail_at(start));
    assert!(!policy.should_fail_at(start + Duration::from_millis(1100)));
    assert!(!policy.should_fail_at(start + Duration::from_millis(2200)));
    assert!(!policy.should_fail_at(start + Duration::from_millis(3300)));
    assert_eq!(policy.fail_counter(), 1);
}

#[test]
fn test_throttling_window_is_measured_from_last_error() {
    let mut policy = ThrottlingFailurePolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();

    assert!(!policy.should_fail_at(start));
    assert!(!policy.should_fail_at(start + Duration::from_millis(900)));
    assert!(policy.should_fail_at(start + Duration::from_millis(1800)));
}

#[test]
fn test_threshold_of_one_fails_immediately() {
    let mut policy = ThrottlingFailurePolicy::new(1, Duration::from_millis(1000));
    assert!(policy.should_fail());
}

#[test]
fn test_policy_config_creates_policy() {
    let mut immediate = FailurePolicyConfig::Immediate.create();
    assert!(immediate.should_fail());

    let mut throttled = FailurePolicyConfig::Throttling {
        failure_threshold: 2,
        reset_after_ms: 10_000,
    }
    .create();
    assert!(!throttled.should_fail());
    assert!(throttled.should_fail());
}
