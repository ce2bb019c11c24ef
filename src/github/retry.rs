//! Optimistic-concurrency retry for single-file writes.

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::errors::{StoreError, StoreResult};

/// Bounded retry with linearly increasing backoff.
///
/// After the n-th conflicting submission the policy waits `base_delay × n`. Once
/// `max_attempts` submissions have conflicted it gives up with an exhausted
/// [`StoreError::VersionConflict`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: config.retry_base_delay,
        }
    }
}

impl RetryPolicy {
    /// Backoff observed after conflicting attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `attempt` until it succeeds, fails for a non-conflict reason, or the
    /// attempts are used up. The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, path: &str, mut attempt: F) -> StoreResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut number = 1;
        loop {
            match attempt(number).await {
                Err(err) if err.is_retryable() => {
                    let delay = self.delay_for(number);
                    tracing::warn!(
                        "Version conflict on {} (attempt {}/{}), waiting {:?}",
                        path,
                        number,
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;

                    if number >= self.max_attempts {
                        tracing::error!(
                            "Giving up on {} after {} conflicting attempts",
                            path,
                            number
                        );
                        return Err(StoreError::VersionConflict {
                            path: path.to_string(),
                            attempts: number,
                        });
                    }
                    number += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tokio::time::Instant;

    fn conflict() -> StoreError {
        StoreError::VersionConflict {
            path: "data/ideas.json".to_string(),
            attempts: 1,
        }
    }

    #[test]
    fn test_backoff_table() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=3).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 1500]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_conflict_stops_after_three_attempts() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let seen = RefCell::new(Vec::new());

        let result: StoreResult<()> = policy
            .run("data/ideas.json", |n| {
                seen.borrow_mut().push((n, start.elapsed().as_millis()));
                async { Err(conflict()) }
            })
            .await;

        // Attempts start after 0, 500 and 500 + 1000 ms of backoff
        assert_eq!(*seen.borrow(), vec![(1, 0), (2, 500), (3, 1500)]);
        assert_eq!(start.elapsed().as_millis(), 3000);
        match result {
            Err(StoreError::VersionConflict { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted conflict, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_then_success() {
        let policy = RetryPolicy::default();
        let calls = RefCell::new(0);

        let result = policy
            .run("data/games.json", |n| {
                *calls.borrow_mut() += 1;
                async move {
                    if n == 1 {
                        Err(conflict())
                    } else {
                        Ok("commit-sha")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "commit-sha");
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_fail_immediately() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let calls = RefCell::new(0);

        let result: StoreResult<()> = policy
            .run("data/games.json", |_| {
                *calls.borrow_mut() += 1;
                async { Err(StoreError::Unauthorized("bad token".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(start.elapsed().as_millis(), 0);
    }
}
