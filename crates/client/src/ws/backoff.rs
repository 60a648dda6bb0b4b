//! Exponential backoff for reconnect attempts.
//!
//! Pure computation: no clocks, no I/O. The supervisor owns a
//! [`ReconnectState`] and asks the [`BackoffPolicy`] for the next one.

use std::time::Duration;

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Retries allowed before giving up
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 5_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

/// Where the retry loop currently stands.
///
/// Invariant: `delay_ms == policy.delay_for_attempt(attempts)` for states
/// produced by [`BackoffPolicy::reset`] and [`BackoffPolicy::next_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl ReconnectState {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl BackoffPolicy {
    /// State after a successful open (or before the first attempt).
    pub fn reset(&self) -> ReconnectState {
        ReconnectState {
            attempts: 0,
            delay_ms: self.base_delay_ms.min(self.max_delay_ms),
        }
    }

    /// Advance by one failed attempt.
    pub fn next_delay(&self, state: ReconnectState) -> ReconnectState {
        ReconnectState {
            attempts: state.attempts.saturating_add(1),
            delay_ms: state.delay_ms.saturating_mul(2).min(self.max_delay_ms),
        }
    }

    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        1u64.checked_shl(attempt)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .map_or(self.max_delay_ms, |delay| delay.min(self.max_delay_ms))
    }

    /// True once `state` has used up every allowed retry.
    pub fn is_exhausted(&self, state: &ReconnectState) -> bool {
        state.attempts >= self.max_attempts
    }
}
