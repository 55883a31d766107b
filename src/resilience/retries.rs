//! Retry logic on top of a circuit breaker.
//!
//! # Responsibilities
//! - Run an operation through the breaker up to `max_retries + 1` times
//! - Wait a fixed `retry_delay` between attempts
//! - Stop before the next attempt once the caller's context is done
//!
//! # Design Decisions
//! - An open circuit ends the call at once; retrying it only burns the budget
//! - The retry delay races the context, so cancellation never waits it out
//! - Cancellation takes priority over a delay that elapses at the same time
//! - Fixed delay, no backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ResilienceConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::resilience::context::CallContext;
use crate::resilience::error::{BreakerError, RetryError};

/// Breaker-guarded operation runner with bounded, cancellable retries.
///
/// Share it between tasks behind an `Arc`; all callers then share one breaker.
#[derive(Debug)]
pub struct RetryableService {
    breaker: CircuitBreaker,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryableService {
    /// Create a service with a default breaker (3 failures, 5 second cooldown).
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self::with_breaker(
            max_retries,
            retry_delay,
            CircuitBreaker::with_config(CircuitBreakerConfig::default()),
        )
    }

    pub fn with_breaker(max_retries: u32, retry_delay: Duration, breaker: CircuitBreaker) -> Self {
        Self {
            breaker,
            max_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::with_breaker(
            config.retry.max_retries,
            config.retry.retry_delay(),
            CircuitBreaker::with_config(CircuitBreakerConfig::from(&config.breaker)),
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Run `operation` with retries until it succeeds, the circuit opens,
    /// `ctx` finishes or the attempts run out.
    pub async fn call_with_retry<F, Fut, T, E>(
        &self,
        ctx: &CallContext,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let span = debug_span!(
            "call_with_retry",
            call_id = %Uuid::new_v4(),
            breaker = %self.breaker.name(),
        );
        self.run(ctx, operation).instrument(span).await
    }

    async fn run<F, Fut, T, E>(&self, ctx: &CallContext, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u32 = 0;

        loop {
            if let Some(cause) = ctx.cause() {
                debug!(attempts = attempt, %cause, "Call cancelled before attempt");
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    cause,
                });
            }

            let result = match self.breaker.execute_within(ctx, || operation()).await {
                Ok(result) => result,
                Err(cause) => {
                    debug!(attempts = attempt, %cause, "Call cancelled while queued for breaker");
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        cause,
                    });
                }
            };
            attempt += 1;

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempts = attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(BreakerError::Open(open)) => {
                    debug!(attempts = attempt, error = %open, "Circuit open, not retrying");
                    return Err(RetryError::CircuitOpen(open));
                }
                Err(BreakerError::Operation(e)) => e,
            };

            if attempt > self.max_retries {
                warn!(
                    attempts = attempt,
                    max_retries = self.max_retries,
                    error = %error,
                    "Final attempt failed"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            debug!(
                attempt,
                delay = ?self.retry_delay,
                error = %error,
                "Attempt failed, waiting before retry"
            );

            tokio::select! {
                biased;
                cause = ctx.done() => {
                    debug!(attempts = attempt, %cause, "Call cancelled during retry delay");
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        cause,
                    });
                }
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}
