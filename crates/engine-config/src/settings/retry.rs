use connectors::retry::{BackoffStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable form of a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffStrategy,
}

impl RetryConfig {
    pub const fn fixed(max_attempts: usize, delay_ms: u64) -> Self {
        RetryConfig {
            max_attempts,
            delay_ms,
            backoff: BackoffStrategy::Fixed,
        }
    }

    pub const fn exponential(max_attempts: usize, delay_ms: u64) -> Self {
        RetryConfig {
            max_attempts,
            delay_ms,
            backoff: BackoffStrategy::Exponential,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        match self.backoff {
            BackoffStrategy::Fixed => RetryPolicy::fixed(self.max_attempts, delay),
            BackoffStrategy::Exponential => RetryPolicy::exponential(self.max_attempts, delay),
        }
    }
}

/// Retry behaviour for each kind of call made against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub auth: RetryConfig,
    pub fetch: RetryConfig,
    pub batch: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            auth: RetryConfig::fixed(5, 5_000),
            fetch: RetryConfig::exponential(5, 120_000),
            batch: RetryConfig::fixed(5, 5_000),
        }
    }
}

impl RetrySettings {
    /// Same attempt counts with no waiting between attempts.
    pub fn immediate() -> Self {
        let defaults = Self::default();
        RetrySettings {
            auth: RetryConfig::fixed(defaults.auth.max_attempts, 0),
            fetch: RetryConfig::fixed(defaults.fetch.max_attempts, 0),
            batch: RetryConfig::fixed(defaults.batch.max_attempts, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_presets() {
        let retry = RetrySettings::default();

        assert_eq!(retry.auth.policy(), RetryPolicy::for_auth());
        assert_eq!(retry.fetch.policy(), RetryPolicy::for_page_fetch());
        assert_eq!(retry.batch.policy(), RetryPolicy::for_batch());
    }

    #[test]
    fn test_backoff_defaults_to_fixed() {
        let config: RetryConfig =
            serde_json::from_str(r#"{ "max_attempts": 3, "delay_ms": 250 }"#).unwrap();

        assert_eq!(config, RetryConfig::fixed(3, 250));
        assert_eq!(
            config.policy(),
            RetryPolicy::fixed(3, Duration::from_millis(250))
        );
    }
}
