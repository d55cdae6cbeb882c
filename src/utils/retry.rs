// Retry utilities - Bounded retry with exponential backoff
//
// Used for optimistic-concurrency writes: the caller decides which errors are
// worth another attempt, and every attempt re-runs the whole operation.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior with exponential backoff.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use certmon::utils::retry::RetryConfig;
///
/// let config = RetryConfig {
///     max_attempts: 3,
///     initial_backoff: Duration::from_millis(100),
///     max_backoff: Duration::from_secs(5),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    /// Default: 5
    pub max_attempts: usize,

    /// Wait before the second attempt, doubled after each failure.
    /// Default: 50ms
    #[serde(with = "millis")]
    pub initial_backoff: Duration,

    /// Upper bound for the wait between attempts.
    /// Default: 1 second
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: usize, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(0),
            max_backoff: Duration::from_millis(0),
        }
    }
}

/// Error returned once retrying stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    /// Number of attempts made
    pub attempts: usize,
    /// Error from the last attempt
    pub error: E,
}

/// Retry an async operation with exponential backoff.
///
/// The operation runs at most `max_attempts` times (at least once). An error
/// for which `is_retriable` returns false stops immediately.
///
/// # Examples
///
/// ```
/// use certmon::utils::retry::{RetryConfig, retry_with_backoff};
///
/// # async fn example() {
/// let result: Result<u32, _> = retry_with_backoff(
///     &RetryConfig::no_retry(),
///     |_: &String| true,
///     || async { Ok::<u32, String>(7) },
/// )
/// .await;
/// assert_eq!(result.unwrap(), 7);
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    is_retriable: R,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut backoff = config.initial_backoff;

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::debug!("Operation succeeded after {} attempt(s)", attempts);
                }
                return Ok(result);
            }
            Err(e) => {
                if !is_retriable(&e) {
                    tracing::debug!("Non-retriable error encountered: {}", e);
                    return Err(RetryError { attempts, error: e });
                }

                if attempts >= max_attempts {
                    tracing::debug!("Max attempts ({}) exhausted, giving up: {}", max_attempts, e);
                    return Err(RetryError { attempts, error: e });
                }

                tracing::warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempts,
                    max_attempts,
                    e,
                    backoff
                );

                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
