//! Reconnect delay schedule.
//!
//! Wraps `backoff::ExponentialBackoff` with jitter disabled and no elapsed-time
//! limit, so the schedule is exactly `min(max_delay, initial_delay * multiplier^(k-1))`
//! for the k-th consecutive failure.

use std::fmt;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Backoff parameters for stream reconnects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

/// Consecutive-failure state for one connection manager.
///
/// `next_delay` hands out the current delay and grows it for the next failure;
/// `reset` goes back to the initial delay after a successful connection.
pub struct ReconnectBackoff {
    policy: ReconnectPolicy,
    inner: ExponentialBackoff,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let inner = ExponentialBackoff {
            current_interval: policy.initial_delay,
            initial_interval: policy.initial_delay,
            randomization_factor: 0.0,
            multiplier: policy.multiplier,
            max_interval: policy.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        };

        Self {
            policy,
            inner,
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        // No elapsed-time limit is set, so the schedule never runs out.
        self.inner.next_backoff().unwrap_or(self.policy.max_delay)
    }

    /// Delay the next failure will be scheduled with.
    pub fn current_delay(&self) -> Duration {
        self.inner.current_interval
    }

    /// Consecutive failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.attempt = 0;
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

impl fmt::Debug for ReconnectBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectBackoff")
            .field("policy", &self.policy)
            .field("current_delay", &self.current_delay())
            .field("attempt", &self.attempt)
            .finish()
    }
}
