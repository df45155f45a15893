//! Retry logic for transient service failures
//!
//! Every request to the processing service is classified after each attempt:
//! transient failures (timeouts, gateway timeouts) are retried up to a fixed
//! number of attempts, fatal failures are returned immediately. The delay between
//! attempts is configurable and defaults to none.
//!
//! # Example
//!
//! ```no_run
//! use reprocess_wps::retry::{IsRetryable, request_with_retry};
//! use reprocess_wps::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = request_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, ProtocolError};
use std::future::Future;
use std::time::Duration;

/// HTTP status the upstream gateway answers with when the service is slow
pub const GATEWAY_TIMEOUT: u16 = 504;

/// Trait for errors that can be classified as transient or fatal
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Only timeouts are transient; refused connections and TLS failures are not
            Error::Network(e) => e.is_timeout(),
            Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            Error::Protocol(ProtocolError::UnexpectedStatus { status, .. }) => {
                *status == GATEWAY_TIMEOUT
            }
            Error::Protocol(_) => false,
            Error::Config { .. } => false,
            // Already the product of an exhausted retry loop
            Error::ServiceUnavailable { .. } => false,
            Error::RemoteProcess { .. } => false,
            Error::Rejected(_) => false,
            Error::Download(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// `config.max_attempts` bounds the total number of calls to `operation`.
/// Returns the successful result, the first fatal error, or the last transient
/// error once every attempt has been used.
pub async fn request_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::debug!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Transient failure, retrying"
                );

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                    let next_delay =
                        Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                            .unwrap_or(config.max_delay);
                    delay = next_delay.min(config.max_delay);
                }
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt,
                        "Request failed after all attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
