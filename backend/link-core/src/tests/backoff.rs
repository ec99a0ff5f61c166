use crate::connection::backoff::{ReconnectBackoff, ReconnectPolicy};

use std::time::Duration;

/// **VALUE**: Verifies the default reconnect schedule doubles from 500ms.
///
/// **BUG THIS CATCHES**: Would catch jitter being left enabled (delays would no
/// longer be exact) or the multiplier being applied before the first attempt.
#[test]
fn given_default_policy_when_failures_accumulate_then_delays_double_from_500ms() {
    // GIVEN: A fresh backoff with the default policy
    let mut backoff = ReconnectBackoff::new(ReconnectPolicy::default());

    // WHEN: Three consecutive failures ask for a delay
    let delays: Vec<Duration> = (0..3).map(|_| backoff.next_delay()).collect();

    // THEN: 500ms, 1000ms, 2000ms
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(2000),
        ]
    );
    assert_eq!(backoff.attempt(), 3);
    assert_eq!(backoff.current_delay(), Duration::from_millis(4000));
}

/// **VALUE**: Verifies the delay never exceeds the configured maximum.
#[test]
fn given_small_cap_when_many_failures_then_delay_stays_at_cap() {
    // GIVEN: A policy capped at 3s
    let mut backoff = ReconnectBackoff::new(ReconnectPolicy {
        max_delay: Duration::from_secs(3),
        ..ReconnectPolicy::default()
    });

    // WHEN: Many failures accumulate
    let delays: Vec<Duration> = (0..6).map(|_| backoff.next_delay()).collect();

    // THEN: The schedule grows to the cap and stays there
    assert_eq!(delays[3], Duration::from_secs(3));
    assert_eq!(delays[4], Duration::from_secs(3));
    assert_eq!(delays[5], Duration::from_secs(3));
}

#[test]
fn given_default_policy_when_failing_long_enough_then_capped_at_60s() {
    let mut backoff = ReconnectBackoff::new(ReconnectPolicy::default());

    let last = (0..20).map(|_| backoff.next_delay()).last().unwrap();

    assert_eq!(last, Duration::from_secs(60));
}

/// **VALUE**: Verifies a successful connection puts the schedule back to the start.
///
/// **BUG THIS CATCHES**: Would catch `reset()` only clearing the attempt counter,
/// which would make the first failure after a long healthy period wait a minute.
#[test]
fn given_advanced_backoff_when_reset_then_next_delay_is_initial() {
    // GIVEN: A backoff that has already grown
    let mut backoff = ReconnectBackoff::new(ReconnectPolicy::default());
    backoff.next_delay();
    backoff.next_delay();

    // WHEN: Resetting
    backoff.reset();

    // THEN: Back to 500ms and attempt 0
    assert_eq!(backoff.attempt(), 0);
    assert_eq!(backoff.current_delay(), Duration::from_millis(500));
    assert_eq!(backoff.next_delay(), Duration::from_millis(500));
}
