//! Retry schedule for outbound calls made inside stage handlers.
//!
//! A [`RetryPolicy`] only describes *when* to try again; the async loop that
//! sleeps and re-invokes lives next to the callers in the `nodes` crate. After
//! the last attempt fails the caller degrades to a neutral value instead of
//! failing the run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Retryability;

/// Shape of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay grows by `base_delay` per attempt: `base`, `2 × base`, ...
    Linear,
}

/// Bounded retry with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Linear backoff with `max_attempts` attempts (clamped to at least 1).
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Whether another attempt may follow the (1-based) `attempt` that just failed.
    pub fn should_retry(&self, attempt: u32, retryability: &Retryability) -> bool {
        retryability.is_retryable() && attempt < self.max_attempts
    }

    /// Delay to wait after the (1-based) `attempt` failed.
    ///
    /// A server-provided minimum from [`Retryability::Retryable`] wins when it
    /// is longer than the schedule.
    pub fn delay_after(&self, attempt: u32, retryability: &Retryability) -> Duration {
        let scheduled = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt.max(1)),
        };
        match retryability {
            Retryability::Retryable { after: Some(min) } => scheduled.max(*min),
            _ => scheduled,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 2s then 4s.
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRY: Retryability = Retryability::Retryable { after: None };

    #[test]
    fn linear_schedule_grows_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1, &RETRY), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2, &RETRY), Duration::from_secs(4));
    }

    #[test]
    fn fixed_schedule_is_constant() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            backoff: Backoff::Fixed,
        };
        assert_eq!(policy.delay_after(1, &RETRY), policy.delay_after(4, &RETRY));
    }

    #[test]
    fn server_minimum_overrides_shorter_schedule() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(1));
        let after = Retryability::Retryable {
            after: Some(Duration::from_secs(10)),
        };
        assert_eq!(policy.delay_after(1, &after), Duration::from_secs(10));
    }

    #[test]
    fn stops_at_max_attempts_and_on_final_errors() {
        let policy = RetryPolicy::linear(3, Duration::ZERO);
        assert!(policy.should_retry(1, &RETRY));
        assert!(policy.should_retry(2, &RETRY));
        assert!(!policy.should_retry(3, &RETRY));
        assert!(!policy.should_retry(1, &Retryability::NonRetryable));
    }

    #[test]
    fn attempts_are_clamped_to_one() {
        assert_eq!(RetryPolicy::linear(0, Duration::ZERO).max_attempts, 1);
        assert!(!RetryPolicy::none().should_retry(1, &RETRY));
    }
}
