//! Circuit-breaker-protected calls with bounded retry.
//!
//! Each attempt asks the breaker for permission, runs the call, and reports
//! its outcome and duration. Only transient backend failures are retried;
//! a rejected call fails fast without consuming a retry.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::breaker::{CircuitBreaker, CircuitState, Permit};
use crate::client::BackendError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Retry policy applied around each breaker-guarded call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Errors surfaced by [`CircuitBreakerGate::call`].
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Breaker rejected the call; the backend was not invoked
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),

    /// Non-retryable backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Every attempt failed with a transient error
    #[error("All {attempts} attempts exhausted. Last error: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: BackendError,
    },
}

/// Holds a breaker permit for one attempt. Dropping it without reporting an
/// outcome (panic or cancellation) hands a trial slot back to the breaker.
struct Attempt<'a> {
    breaker: &'a CircuitBreaker,
    permit: Option<Permit>,
}

impl Attempt<'_> {
    fn succeeded(mut self, elapsed: Duration) {
        self.permit = None;
        self.breaker.on_success(elapsed);
    }

    fn failed(mut self, elapsed: Duration) {
        self.permit = None;
        self.breaker.on_failure(elapsed);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.breaker.release_trial(permit);
        }
    }
}

/// Wraps backend calls with a [`CircuitBreaker`] and a [`RetryPolicy`].
#[derive(Debug)]
pub struct CircuitBreakerGate {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl CircuitBreakerGate {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        Self { breaker, retry }
    }

    /// Shared handle to the breaker, for read-only inspection.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `op` through the breaker, retrying transient failures.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, GateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let permit = match self.breaker.acquire() {
                Some(permit) => Attempt {
                    breaker: &self.breaker,
                    permit: Some(permit),
                },
                None => return Err(GateError::CircuitOpen(self.breaker.name().to_string())),
            };

            let started = Instant::now();
            let result = op().await;
            let elapsed = started.elapsed();

            let err = match result {
                Ok(value) => {
                    permit.succeeded(elapsed);
                    return Ok(value);
                }
                Err(err) => {
                    permit.failed(elapsed);
                    err
                }
            };

            if !err.is_transient() {
                return Err(GateError::Backend(err));
            }

            if attempt >= self.retry.max_retries {
                return Err(if attempt == 0 {
                    GateError::Backend(err)
                } else {
                    GateError::RetriesExhausted {
                        attempts: attempt + 1,
                        last_error: err,
                    }
                });
            }

            attempt += 1;
            debug!(
                error = %err,
                attempt,
                max_retries = self.retry.max_retries,
                delay_ms = self.retry.backoff.as_millis() as u64,
                "Backend call failed, will retry"
            );
            tokio::time::sleep(self.retry.backoff).await;
        }
    }
}
