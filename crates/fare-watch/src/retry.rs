// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded-attempt retry policy and an injectable sleep.

use async_trait::async_trait;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `after`, then make attempt number `attempt` (1-based).
    Retry { attempt: u32, after: Duration },
    /// Attempts are exhausted.
    GiveUp { attempts: u32 },
}

/// Fixed-delay retry policy for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Decide after attempt number `failed_attempt` (1-based) has failed.
    pub fn after_failure(&self, failed_attempt: u32) -> RetryDecision {
        if failed_attempt >= self.max_attempts {
            RetryDecision::GiveUp {
                attempts: failed_attempt,
            }
        } else {
            RetryDecision::Retry {
                attempt: failed_attempt + 1,
                after: self.delay,
            }
        }
    }
}

/// Source of delays, swapped out in tests so no real time passes.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_retries_until_exhausted() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        assert_eq!(
            policy.after_failure(1),
            RetryDecision::Retry {
                attempt: 2,
                after: Duration::from_secs(5)
            }
        );
        assert_eq!(
            policy.after_failure(2),
            RetryDecision::Retry {
                attempt: 3,
                after: Duration::from_secs(5)
            }
        );
        assert_eq!(policy.after_failure(3), RetryDecision::GiveUp { attempts: 3 });
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.after_failure(1), RetryDecision::GiveUp { attempts: 1 });
    }

    #[tokio::test]
    async fn test_tokio_sleeper_zero() {
        TokioSleeper.sleep(Duration::ZERO).await;
    }
}
