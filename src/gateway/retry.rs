//! Bounded linear-backoff retry for upstream HTTP calls.

use crate::error::CogsError;
use log::{info, warn};
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before retry `n` is `n * backoff_step`.
    pub backoff_step: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum FetchError {
    /// Network error, 429 or 5xx. Worth another attempt.
    Transient(String),
    Fatal(CogsError),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            FetchError::Transient(e.to_string())
        } else if e.status().is_some_and(is_retryable_status) {
            FetchError::Transient(e.to_string())
        } else {
            FetchError::Fatal(CogsError::Http(e))
        }
    }
}

impl From<CogsError> for FetchError {
    fn from(e: CogsError) -> Self {
        FetchError::Fatal(e)
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Passes successful responses through and sorts failures into transient
/// and fatal.
pub async fn check_status(response: Response, operation: &str) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("status {}: {}", status, body.trim());

    if is_retryable_status(status) {
        return Err(FetchError::Transient(message));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Fatal(CogsError::Authentication(format!(
            "{} rejected credentials ({})",
            operation, message
        ))));
    }

    Err(FetchError::Fatal(CogsError::Upstream {
        operation: operation.to_string(),
        attempts: 1,
        message,
    }))
}

/// Runs `f` until it succeeds, fails fatally, or the policy's attempts run out.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    f: F,
) -> crate::error::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(FetchError::Fatal(e)) => return Err(e),
            Err(FetchError::Transient(message)) => {
                if attempt >= max_attempts {
                    warn!(
                        "{} failed after {} attempt(s): {}",
                        operation, attempt, message
                    );
                    return Err(CogsError::Upstream {
                        operation: operation.to_string(),
                        attempts: attempt,
                        message,
                    });
                }

                let wait = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation, attempt, max_attempts, wait, message
                );
                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
