//! # Bounded Retry
//!
//! Fixed-backoff retry for lookups that may fail only because something is not
//! initialized yet. The policy knows nothing about what it retries: an
//! operation either returns `Ok` (done) or `Err` (transient, try again).
//!
//! - At most `max_attempts` attempts.
//! - Exactly `backoff_period` between consecutive attempts, none after the last.
//! - The first `Ok` ends the loop.
//! - When attempts run out, the **last** error is returned inside
//!   [`RetryExhausted`].
//!
//! ```rust
//! use std::num::NonZeroU32;
//! use std::time::Duration;
//! use streamweave_query::retry::RetryPolicy;
//!
//! # async fn example() {
//! let policy = RetryPolicy::new(NonZeroU32::new(3).unwrap(), Duration::from_millis(10));
//! let value = policy
//!   .execute(|attempt| async move { if attempt < 2 { Err("not yet") } else { Ok(attempt) } })
//!   .await
//!   .unwrap();
//! assert_eq!(value, 2);
//! # }
//! ```

use crate::config::StateStoreRetry;
use crate::error::ConfigError;
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Fixed-backoff, bounded-attempt retry executor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
  max_attempts: NonZeroU32,
  backoff_period: Duration,
}

impl RetryPolicy {
  /// Creates a policy with the given attempt budget and backoff.
  pub fn new(max_attempts: NonZeroU32, backoff_period: Duration) -> Self {
    Self {
      max_attempts,
      backoff_period,
    }
  }

  /// Single attempt, no backoff.
  pub fn once() -> Self {
    Self::new(NonZeroU32::MIN, Duration::ZERO)
  }

  /// Sets the backoff between attempts.
  pub fn with_backoff_period(mut self, backoff_period: Duration) -> Self {
    self.backoff_period = backoff_period;
    self
  }

  /// Maximum number of attempts.
  pub fn max_attempts(&self) -> u32 {
    self.max_attempts.get()
  }

  /// Pause between attempts.
  pub fn backoff_period(&self) -> Duration {
    self.backoff_period
  }

  /// Runs `operation` until it succeeds or the attempt budget is spent.
  ///
  /// `operation` receives the 1-based attempt number. No lock or borrow is
  /// held across the backoff sleep other than what `operation` itself keeps.
  pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let max_attempts = self.max_attempts.get();
    let mut attempt = 1;
    loop {
      match operation(attempt).await {
        Ok(value) => return Ok(value),
        Err(last) if attempt >= max_attempts => {
          return Err(RetryExhausted {
            attempts: attempt,
            last,
          });
        }
        Err(_) => {
          debug!(
            attempt,
            max_attempts,
            backoff_ms = self.backoff_period.as_millis() as u64,
            "attempt failed, backing off"
          );
          if !self.backoff_period.is_zero() {
            tokio::time::sleep(self.backoff_period).await;
          }
          attempt += 1;
        }
      }
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(NonZeroU32::MIN, Duration::from_millis(1000))
  }
}

impl TryFrom<&StateStoreRetry> for RetryPolicy {
  type Error = ConfigError;

  fn try_from(config: &StateStoreRetry) -> Result<Self, Self::Error> {
    let max_attempts =
      NonZeroU32::new(config.max_attempts).ok_or(ConfigError::InvalidMaxAttempts(config.max_attempts))?;
    Ok(Self::new(max_attempts, config.backoff_period))
  }
}

/// Every attempt failed; carries the number of attempts and the last error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryExhausted<E> {
  /// Attempts performed.
  pub attempts: u32,
  /// Error from the final attempt.
  pub last: E,
}

impl<E> RetryExhausted<E> {
  /// Returns the last error.
  pub fn into_last(self) -> E {
    self.last
  }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "gave up after {} attempt(s): {}", self.attempts, self.last)
  }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.last)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Instant;
  use tokio_test::{assert_err, assert_ok};

  fn policy(attempts: u32, backoff_ms: u64) -> RetryPolicy {
    RetryPolicy::new(NonZeroU32::new(attempts).unwrap(), Duration::from_millis(backoff_ms))
  }

  #[tokio::test]
  async fn test_first_success_returns_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let result: Result<&str, RetryExhausted<()>> = policy(5, 1000)
      .execute(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok("ready") }
      })
      .await;
    assert_eq!(assert_ok!(result), "ready");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_succeeds_after_transient_failures() {
    let result = policy(4, 1)
      .execute(|attempt| async move {
        if attempt < 3 { Err(format!("attempt {}", attempt)) } else { Ok(attempt) }
      })
      .await;
    assert_eq!(assert_ok!(result), 3);
  }

  #[tokio::test]
  async fn test_exhaustion_keeps_last_error() {
    let result: Result<(), _> = policy(3, 1)
      .execute(|attempt| async move { Err(format!("attempt {}", attempt)) })
      .await;
    let err = assert_err!(result);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.last, "attempt 3");
    assert_eq!(err.to_string(), "gave up after 3 attempt(s): attempt 3");
  }

  #[tokio::test]
  async fn test_sleeps_between_attempts_only() {
    let start = Instant::now();
    let result: Result<(), RetryExhausted<&str>> =
      policy(3, 100).execute(|_| async { Err("unavailable") }).await;
    let elapsed = start.elapsed();
    assert_err!(result);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "elapsed {:?}", elapsed);
  }

  #[tokio::test]
  async fn test_single_attempt_never_sleeps() {
    let start = Instant::now();
    let result: Result<(), RetryExhausted<&str>> = RetryPolicy::default()
      .execute(|_| async { Err("unavailable") })
      .await;
    assert_eq!(assert_err!(result).attempts, 1);
    assert!(start.elapsed() < Duration::from_millis(500));
  }

  #[test]
  fn test_built_from_config() {
    let ok = RetryPolicy::try_from(&StateStoreRetry::new(4, Duration::from_millis(20))).unwrap();
    assert_eq!(ok.max_attempts(), 4);
    assert_eq!(ok.backoff_period(), Duration::from_millis(20));
    assert_eq!(
      RetryPolicy::try_from(&StateStoreRetry::new(0, Duration::ZERO)),
      Err(ConfigError::InvalidMaxAttempts(0))
    );
    assert_eq!(RetryPolicy::once().max_attempts(), 1);
  }
}
