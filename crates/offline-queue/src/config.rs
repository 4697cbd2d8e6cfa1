//! Queue configuration

use crate::retry::RetryPolicy;

/// Storage key of the pending queue
pub const DEFAULT_QUEUE_KEY: &str = "@umilax_offline_queue_v1";

/// Storage key of the dead-letter collection
pub const DEFAULT_DEAD_LETTER_KEY: &str = "@umilax_offline_dead_letter_v1";

/// Offline queue configuration
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Key the pending collection is persisted under
    pub queue_key: String,
    /// Key the dead-letter collection is persisted under
    pub dead_letter_key: String,
    /// What to do with items that keep failing
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            dead_letter_key: DEFAULT_DEAD_LETTER_KEY.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with default keys and retry policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the environment
    ///
    /// Reads `UMILAX_QUEUE_KEY` and `UMILAX_MAX_RETRIES`; anything missing or
    /// unparsable keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("UMILAX_QUEUE_KEY") {
            if !key.trim().is_empty() {
                config.queue_key = key.trim().to_string();
            }
        }

        if let Ok(raw) = std::env::var("UMILAX_MAX_RETRIES") {
            match raw.trim().parse::<u32>() {
                Ok(max) if max > 0 => config.retry.max_retries = Some(max),
                _ => tracing::warn!(value = %raw, "ignoring invalid UMILAX_MAX_RETRIES"),
            }
        }

        config
    }

    /// Set the queue storage key
    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = key.into();
        self
    }

    /// Set the dead-letter storage key
    pub fn with_dead_letter_key(mut self, key: impl Into<String>) -> Self {
        self.dead_letter_key = key.into();
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.queue_key, "@umilax_offline_queue_v1");
        assert_eq!(config.dead_letter_key, "@umilax_offline_dead_letter_v1");
        assert_eq!(config.retry, RetryPolicy::unlimited());
    }

    #[test]
    fn test_builder() {
        let config = QueueConfig::new()
            .with_queue_key("q")
            .with_dead_letter_key("dlq")
            .with_retry(RetryPolicy::unlimited().with_max_retries(5));

        assert_eq!(config.queue_key, "q");
        assert_eq!(config.dead_letter_key, "dlq");
        assert_eq!(config.retry.max_retries, Some(5));
    }
}
