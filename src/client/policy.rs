//! Retry and reconnect policies.
//!
//! | Policy | Default | Applies to |
//! |--------|---------|------------|
//! | [`RetryPolicy`] | resend after 1s, 3 attempts total | In-flight requests while open |
//! | [`ReconnectPolicy`] | 1s doubling up to 30s | Transport after a non-caller close |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default wait before resending an unanswered request.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of sends per request, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default first reconnect delay.
pub const DEFAULT_RECONNECT_INITIAL: Duration = Duration::from_secs(1);

/// Default reconnect delay ceiling.
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Largest doubling exponent applied to the initial delay.
const MAX_BACKOFF_SHIFT: u32 = 16;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Per-request resend policy.
///
/// A request unanswered after `interval` is resent with the same id and the
/// same bytes. After `max_attempts` sends the call stays outstanding until a
/// late response arrives or the transport closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between sends.
    pub interval: Duration,
    /// Total sends, the first one included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[inline]
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// A policy that sends every request exactly once.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, 1)
    }

    /// Returns `true` if a call that has been sent `attempts_made` times
    /// should be sent again.
    #[inline]
    #[must_use]
    pub const fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Delay between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// `initial * 2^n`, capped at `max`. Reset after a successful login.
    Exponential {
        /// Delay before the first reconnect.
        initial: Duration,
        /// Ceiling.
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Returns the delay before reconnect number `attempt` (zero based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, max } => {
                let factor = 1u32 << attempt.min(MAX_BACKOFF_SHIFT);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: DEFAULT_RECONNECT_INITIAL,
            max: DEFAULT_RECONNECT_MAX,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }

    #[test]
    fn test_retry_disabled() {
        assert!(!RetryPolicy::disabled().allows_another(1));
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_exponential_large_attempt_saturates() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::Fixed(Duration::from_millis(250));
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(10), Duration::from_millis(250));
    }
}
