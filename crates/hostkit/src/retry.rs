//! Bounded retry of known transient provisioning failures.

use crate::error::{Error, Result};
use std::thread;
use std::time::Duration;

/// Substrings of tool errors that are worth retrying.
pub const TRANSIENT_ERRORS: &[&str] = &[
    "Error requesting spot instances: InvalidSubnetID.NotFound: \
     No default subnet for availability zone: 'null'",
    "Error while waiting for spot request",
];

/// Whether an error message contains a known transient error.
pub fn is_transient(message: &str) -> bool {
    TRANSIENT_ERRORS.iter().any(|pattern| message.contains(pattern))
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 10,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Single attempt.
    pub fn no_retry() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of retry number `retry` (1-indexed).
    fn on_retry(&self, retry: u32, retries: u32, error: &Error, delay: Duration);
}

/// Callback logging each retry as a warning.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, retry: u32, retries: u32, error: &Error, delay: Duration) {
        log::warn!(
            "Transient error, retry {}/{} in {:.1}s: {}",
            retry,
            retries,
            delay.as_secs_f64(),
            error
        );
    }
}

/// Execute an operation, retrying transient failures.
///
/// Non-transient errors are returned as is. A transient error still present
/// after `config.retries` retries becomes `Error::RetryExhausted`.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if attempt >= config.retries {
                    return Err(Error::RetryExhausted {
                        retries: config.retries,
                        message: e.to_string(),
                    });
                }
                attempt += 1;

                if let Some(cb) = callback {
                    cb.on_retry(attempt, config.retries, &e, config.delay);
                }
                thread::sleep(config.delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn transient() -> Error {
        Error::CommandFailed {
            tool: "terraform".to_string(),
            message: "Error while waiting for spot request".to_string(),
        }
    }

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig {
            retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_transient_error() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast(5), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::CommandFailed {
                tool: "terraform".to_string(),
                message: "Not retryable error".to_string(),
            })
        });

        assert_eq!(result.unwrap_err().to_string(), "Not retryable error");
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(&fast(3), None, || {
            let current = attempts_clone.get();
            attempts_clone.set(current + 1);
            if current < 2 { Err(transient()) } else { Ok("done") }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_exhausted() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast(3), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(transient())
        });

        let err = result.unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { retries: 3, .. }));
        assert!(err.to_string().contains("Error while waiting for spot request"));
        assert_eq!(attempts.get(), 4);
    }

    #[test]
    fn test_callback_called() {
        struct Counting(Rc<Cell<u32>>);
        impl RetryCallback for Counting {
            fn on_retry(&self, retry: u32, retries: u32, _error: &Error, _delay: Duration) {
                assert!(retry <= retries);
                self.0.set(self.0.get() + 1);
            }
        }

        let calls = Rc::new(Cell::new(0));
        let callback = Counting(calls.clone());
        let _: Result<()> = with_retry(&fast(2), Some(&callback), || Err(transient()));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(
            "Error: Error requesting spot instances: InvalidSubnetID.NotFound: \
             No default subnet for availability zone: 'null'\n  on main.tf"
        ));
        assert!(!is_transient("InvalidSubnetID.NotFound"));
    }
}
