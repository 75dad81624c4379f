//! Exponential backoff retry policy and per-attempt outcome classification.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{MediatorError, MediatorResult};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff after a 429/5xx response.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each backoff.
    pub max_jitter: Duration,
    /// Fixed delay after a transport-level failure (connect, timeout, DNS, TLS).
    pub transport_error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
            transport_error_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with no jitter and the given delays; mostly useful in tests.
    #[must_use]
    pub fn fixed(max_attempts: u32, base_delay: Duration, transport_error_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter: Duration::ZERO,
            transport_error_delay,
        }
    }

    /// Deterministic backoff component for a 0-based attempt index:
    /// `base_delay * 2^attempt`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Uniform jitter in `[0, max_jitter)`.
    #[must_use]
    pub fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Full delay before retrying after a retryable HTTP status.
    #[must_use]
    pub fn status_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay(attempt) + self.jitter()
    }

    /// Whether another attempt is allowed after the given 0-based attempt.
    #[must_use]
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Classification of a single transport attempt. Never persisted.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response; 204 carries an empty body.
    Success(Vec<u8>),
    /// Connection-level failure, 429 or 5xx. Retried after `delay`.
    Retryable { cause: String, delay: Duration },
    /// Any other status. Returned to the caller unchanged.
    Terminal(MediatorError),
}

impl RetryOutcome {
    /// Classify an HTTP response received on the given 0-based attempt.
    #[must_use]
    pub fn from_status(status: u16, body: Vec<u8>, attempt: u32, policy: &RetryPolicy) -> Self {
        match status {
            429 | 500.. => Self::Retryable {
                cause: format!("API returned status {status}"),
                delay: policy.status_delay(attempt),
            },
            204 => Self::Success(Vec::new()),
            200..=299 => Self::Success(body),
            _ => Self::Terminal(MediatorError::Terminal {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    /// Classify a failure that happened before any HTTP status was observed.
    #[must_use]
    pub fn from_transport_error(err: &reqwest::Error, policy: &RetryPolicy) -> Self {
        Self::Retryable {
            cause: format!("HTTP transport error: {err}"),
            delay: policy.transport_error_delay,
        }
    }
}

/// Sleep for `delay` unless the token fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> MediatorResult<()> {
    tokio::select! {
        () = cancel.cancelled() => Err(MediatorError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
