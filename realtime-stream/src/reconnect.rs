//! Reconnection policy.
//!
//! The policy is a pure function from [`ReconnectState`] to a
//! [`ReconnectDecision`]. It knows nothing about transports or timers; the
//! session driver owns the state, asks for a decision after every
//! non-deliberate drop or failed handshake, and schedules the sleep.
//!
//! # Retry Algorithm
//!
//! With `n` retries already scheduled since the last successful connect:
//!
//! - Retry 1: wait `base_delay * 2^0`
//! - Retry 2: wait `base_delay * 2^1`
//! - Retry k: wait `min(base_delay * 2^(k-1), max_delay)`
//! - Once `n` reaches `max_attempts`: give up

use std::time::Duration;

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    /// Default: 1 second
    pub base_delay: Duration,

    /// Ceiling applied to every computed delay
    /// Default: 30 seconds
    pub max_delay: Duration,

    /// Number of retries before giving up
    /// Default: 5
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Progress through the current run of reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    /// Retries scheduled since the last successful connect
    pub attempt: u32,
    /// Delay the next retry will wait
    pub next_delay: Duration,
}

impl ReconnectState {
    /// Fresh state: no retries yet, next delay is the base delay.
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempt: 0,
            next_delay: policy.delay_for(0),
        }
    }

    /// Record that a retry has been scheduled.
    pub fn advance(&mut self, policy: &ReconnectPolicy) {
        self.attempt = self.attempt.saturating_add(1);
        self.next_delay = policy.delay_for(self.attempt);
    }
}

/// What to do after a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after `delay`
    Retry {
        /// How long to wait first
        delay: Duration,
    },
    /// Stop retrying
    GiveUp,
}

impl ReconnectPolicy {
    /// Create a policy from its three parameters.
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before retry number `attempt + 1`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    /// Decide whether to retry from `state`.
    pub fn decide(&self, state: &ReconnectState) -> ReconnectDecision {
        if state.attempt >= self.max_attempts {
            ReconnectDecision::GiveUp
        } else {
            ReconnectDecision::Retry {
                delay: self.delay_for(state.attempt),
            }
        }
    }
}
