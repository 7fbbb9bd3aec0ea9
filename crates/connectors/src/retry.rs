use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { attempts: usize, last: E },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_batch()
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        base_delay: Duration,
        max_delay: Duration,
        backoff: BackoffStrategy,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay < base_delay {
                base_delay
            } else {
                max_delay
            },
            backoff,
        }
    }

    /// Token exchange: five attempts, five seconds apart.
    pub fn for_auth() -> Self {
        Self::fixed(5, Duration::from_secs(5))
    }

    /// Page reads: five attempts starting at two minutes and doubling.
    pub fn for_page_fetch() -> Self {
        Self::exponential(5, Duration::from_secs(120))
    }

    /// Whole batch submissions: five attempts, five seconds apart.
    pub fn for_batch() -> Self {
        Self::fixed(5, Duration::from_secs(5))
    }

    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self::new(max_attempts, delay, delay, BackoffStrategy::Fixed)
    }

    /// The delay doubles per attempt and is capped at the delay of the last one.
    pub fn exponential(max_attempts: usize, base_delay: Duration) -> Self {
        let shift = max_attempts.saturating_sub(2).min(16) as u32;
        let max_delay = base_delay.saturating_mul(1u32 << shift);
        Self::new(
            max_attempts,
            base_delay,
            max_delay,
            BackoffStrategy::Exponential,
        )
    }

    /// True when another attempt may follow the zero-based `attempt`.
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Executes the operation with the configured retry policy.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if !self.allows_retry(attempt) {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: attempt + 1,
                                last: err,
                            });
                        }

                        let delay = self.backoff_delay(attempt);
                        warn!(
                            "Attempt {} of {} failed: {}. Retrying in {:?}",
                            attempt + 1,
                            self.max_attempts,
                            err,
                            delay
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32 << attempt.min(16);
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }
}
