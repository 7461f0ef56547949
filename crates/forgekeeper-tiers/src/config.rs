//! Retry configuration shared by every remote operation.

use std::time::Duration;

/// Retry configuration for failed tier operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Per-attempt operation timeout
    pub operation_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set maximum backoff duration
    #[must_use]
    pub const fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn operation_timeout(mut self, duration: Duration) -> Self {
        self.operation_timeout = duration;
        self
    }

    /// Calculate backoff for a given attempt (exponential, capped)
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let backoff = self.initial_backoff.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let max = self.max_backoff.as_millis() as u64;
        Duration::from_millis(backoff.min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_backoff(Duration::from_millis(500))
            .max_backoff(Duration::from_secs(4));

        assert_eq!(config.backoff_for(0), Duration::from_millis(500));
        assert_eq!(config.backoff_for(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for(3), Duration::from_secs(4));
        // Capped from here on.
        assert_eq!(config.backoff_for(10), Duration::from_secs(4));
    }
}
