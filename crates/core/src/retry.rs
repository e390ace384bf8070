//! Retry policy value types.
//!
//! The executor that applies a policy lives in `parley-providers`; this module
//! only describes how many attempts are allowed and how long to wait between them.

use crate::error::ProviderError;
use std::time::Duration;

/// How long to wait before attempt `n + 1` after attempt `n` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time.
    Fixed(Duration),
    /// `step * attempt`.
    Linear(Duration),
    /// `initial * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        initial: Duration,
        multiplier: u32,
        max: Duration,
    },
}

impl Backoff {
    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Linear(step) => step.saturating_mul(attempt),
            Backoff::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let factor = multiplier.max(1).saturating_pow(attempt - 1);
                initial.saturating_mul(factor).min(max)
            }
        }
    }

    /// Upper bound for any single wait under this backoff.
    fn ceiling(&self) -> Option<Duration> {
        match *self {
            Backoff::Exponential { max, .. } => Some(max),
            _ => None,
        }
    }
}

/// Bounded retry configuration for one backend category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Longest wait honored from a `Retry-After` hint.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    /// Delay before retrying after `attempt` failed with `error`.
    ///
    /// Rate-limit errors wait at least as long as the backend asked,
    /// bounded by the backoff ceiling (or 60s for uncapped strategies).
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let base = self.backoff.delay(attempt);
        match error.retry_after_secs() {
            Some(secs) => {
                let cap = self.backoff.ceiling().unwrap_or(MAX_RETRY_AFTER);
                base.max(Duration::from_secs(secs).min(cap))
            }
            None => base,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                multiplier: 2,
                max: Duration::from_secs(20),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO)).max_attempts, 1);
    }

    #[test]
    fn linear_backoff_grows_by_step() {
        let b = Backoff::Linear(Duration::from_millis(250));
        assert_eq!(b.delay(1), Duration::from_millis(250));
        assert_eq!(b.delay(3), Duration::from_millis(750));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let b = Backoff::Exponential {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max: Duration::from_secs(5),
        };
        assert_eq!(b.delay(1), Duration::from_secs(1));
        assert_eq!(b.delay(3), Duration::from_secs(4));
        assert_eq!(b.delay(10), Duration::from_secs(5));
    }

    #[test]
    fn rate_limit_hint_extends_delay() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(100)));
        let err = ProviderError::RateLimited { retry_after_secs: 2 };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(2));

        let other = ProviderError::Network("reset".into());
        assert_eq!(policy.delay_for(1, &other), Duration::from_millis(100));
    }

    #[test]
    fn rate_limit_hint_respects_ceiling() {
        let policy = RetryPolicy::new(
            3,
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                multiplier: 2,
                max: Duration::from_secs(10),
            },
        );
        let err = ProviderError::RateLimited { retry_after_secs: 600 };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(10));
    }
}
