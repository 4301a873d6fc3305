//! Shared retry utilities for store operations.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Initial backoff delay in milliseconds for progress-store writes.
pub const STORE_WRITE_BACKOFF_MS: u64 = 100;

/// Maximum backoff delay in milliseconds for progress-store writes.
pub const STORE_WRITE_MAX_BACKOFF_MS: u64 = 2_000;

/// Maximum retry attempts for a single progress-store write.
pub const STORE_WRITE_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(STORE_WRITE_BACKOFF_MS),
            max_delay: Duration::from_millis(STORE_WRITE_MAX_BACKOFF_MS),
            max_retries: STORE_WRITE_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Build the backoff strategy for progress-store writes.
///
/// Progress writes must land for resumability to hold, so reconnectable
/// database faults (locked, busy, connection drops) are retried a few times
/// before the failure is surfaced:
/// - Initial delay: 100 milliseconds
/// - Maximum delay: 2 seconds
/// - Maximum retries: 3
/// - Jitter: enabled
///
/// # Example
///
/// ```ignore
/// use backon::Retryable;
/// use siphon::retry::store_write_backoff;
///
/// let result = operation
///     .retry(store_write_backoff())
///     .when(|e| e.is_reconnectable())
///     .await;
/// ```
#[must_use]
pub fn store_write_backoff() -> ExponentialBuilder {
    RetryConfig::default().into_backoff()
}
