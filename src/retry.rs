//! Retry logic with exponential backoff for transient errors.

use std::fmt;
use std::thread;
use std::time::Duration;

/// Environment variable that turns HTTP request retries off when `false`
pub const ENV_RETRY_MODE: &str = "HTTP_REQ_RETRY_MODE";

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Default config, or [`RetryConfig::no_retry`] when `HTTP_REQ_RETRY_MODE=false`
    pub fn from_env() -> Self {
        match std::env::var(ENV_RETRY_MODE) {
            Ok(mode) if mode == "false" => Self::no_retry(),
            _ => Self::default(),
        }
    }
}

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of the next attempt (`attempt` is 1-indexed)
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay: Duration);
}

/// Callback that logs each retry at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay: Duration) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {:.1}s...",
            delay.as_secs_f64()
        );
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation while it returns a retryable error, using
/// exponential backoff between attempts. Returns the last error once all
/// attempts are used up.
pub fn with_retry<T, E, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt + 1 >= max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }

                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        // Capped
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), None, || Ok::<_, TestError>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_retryable_error() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = with_retry(&fast(), None, || {
            counter.set(counter.get() + 1);
            Err(TestError::Permanent)
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();

        let result = with_retry(&fast(), None, || {
            let current = counter.get();
            counter.set(current + 1);
            if current < 2 { Err(TestError::Transient) } else { Ok(42) }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingCallback(Arc<AtomicU32>);
        impl RetryCallback for CountingCallback {
            fn on_retry(&self, _: u32, _: u32, _: &dyn fmt::Display, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicU32::new(0));
        let callback = CountingCallback(count.clone());

        let _: Result<(), _> = with_retry(&fast(), Some(&callback), || Err(TestError::Transient));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_retry_config() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }
}
