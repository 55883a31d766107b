//! Circuit breaker for a single protected operation.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: operation assumed down, calls fail fast
//! - Half-Open: one trial call decides whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= max_failures (on the failure that reaches it)
//! Open → Half-Open: reset_timeout elapsed since last failure (checked on next call)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per protected resource, owned explicitly (no global instance)
//! - Check, call and update run under one async lock per `execute`. Concurrent
//!   callers queue behind each other, which gives exactly one trial per
//!   half-open episode at the cost of throughput on the guarded resource
//! - No background timer; the Open → Half-Open check is lazy
//! - `state()` reads a published copy and never waits on an in-flight call

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BreakerSettings;
use crate::resilience::context::{CallContext, CancelCause};
use crate::resilience::error::{BreakerError, CircuitOpenError};

/// Circuit breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name used in logs and in [`CircuitOpenError`].
    pub name: String,
    /// Consecutive failures that open the circuit. Zero opens on the first failure.
    pub max_failures: u32,
    /// Cooldown after the last failure before a trial call is admitted.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_failures: 3,
            reset_timeout: Duration::from_secs(5),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            name: settings.name.clone(),
            max_failures: settings.max_failures,
            reset_timeout: settings.reset_timeout(),
        }
    }
}

/// Point-in-time view of a breaker, for logs and status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Mutable breaker state. Only touched with the lock held.
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker guarding one operation.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    /// `state` and `failure_count` packed into one word, written under the lock.
    published: AtomicU64,
}

/// State in the high 32 bits, failure count in the low 32.
fn pack(state: CircuitState, failure_count: u32) -> u64 {
    (u64::from(state as u8) << 32) | u64::from(failure_count)
}

fn unpack(word: u64) -> (CircuitState, u32) {
    (CircuitState::from((word >> 32) as u8), word as u32)
}

impl CircuitBreaker {
    /// Create a breaker named `default`.
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self::with_config(
            CircuitBreakerConfig::default()
                .max_failures(max_failures)
                .reset_timeout(reset_timeout),
        )
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        debug!(
            name = %config.name,
            max_failures = config.max_failures,
            reset_timeout = ?config.reset_timeout,
            "Circuit breaker initialized"
        );

        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
            published: AtomicU64::new(pack(CircuitState::Closed, 0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as of the last completed decision.
    ///
    /// An open breaker whose cooldown has elapsed still reports `Open` until
    /// the next `execute` performs the transition.
    pub fn state(&self) -> CircuitState {
        self.load_published().0
    }

    /// Consecutive failures as of the last completed decision.
    pub fn failure_count(&self) -> u32 {
        self.load_published().1
    }

    /// State and failure count, read together from the same decision.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, failure_count) = self.load_published();
        BreakerSnapshot {
            name: self.config.name.clone(),
            state,
            failure_count,
        }
    }

    fn load_published(&self) -> (CircuitState, u32) {
        unpack(self.published.load(Ordering::Acquire))
    }

    /// Run `operation` once under breaker protection.
    ///
    /// Returns [`BreakerError::Open`] without calling `operation` while the
    /// circuit is open. Operation errors come back as
    /// [`BreakerError::Operation`] unchanged.
    ///
    /// If the returned future is dropped while the operation runs, no outcome
    /// is recorded and the lock is released.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let inner = self.inner.lock().await;
        self.execute_locked(inner, operation).await
    }

    /// Like [`execute`](Self::execute), but gives up while still queued for
    /// the lock once `ctx` is done. The operation never starts after that.
    pub(crate) async fn execute_within<F, Fut, T, E>(
        &self,
        ctx: &CallContext,
        operation: F,
    ) -> Result<Result<T, BreakerError<E>>, CancelCause>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let inner = tokio::select! {
            biased;
            cause = ctx.done() => return Err(cause),
            guard = self.inner.lock() => guard,
        };
        Ok(self.execute_locked(inner, operation).await)
    }

    async fn execute_locked<F, Fut, T, E>(
        &self,
        mut inner: MutexGuard<'_, BreakerState>,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure_at
                .map_or(Duration::MAX, |at| at.elapsed());

            if elapsed > self.config.reset_timeout {
                inner.failure_count = 0;
                self.transition(&mut inner, CircuitState::HalfOpen);
                self.publish(&inner);
            } else {
                debug!(name = %self.config.name, "Circuit breaker rejected call");
                return Err(BreakerError::Open(CircuitOpenError {
                    name: self.config.name.clone(),
                    retry_after: self.config.reset_timeout.saturating_sub(elapsed),
                }));
            }
        }

        let trial = inner.state == CircuitState::HalfOpen;

        let result = match operation().await {
            Ok(value) => {
                inner.failure_count = 0;
                self.transition(&mut inner, CircuitState::Closed);
                Ok(value)
            }
            Err(e) => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.last_failure_at = Some(Instant::now());

                if trial || inner.failure_count >= self.config.max_failures {
                    self.transition(&mut inner, CircuitState::Open);
                }
                Err(BreakerError::Operation(e))
            }
        };

        self.publish(&inner);
        result
    }

    /// Force the breaker back to `Closed` with a zero failure count.
    ///
    /// Waits for an in-flight call to finish first.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        self.transition(&mut inner, CircuitState::Closed);
        self.publish(&inner);
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        match to {
            CircuitState::Open => warn!(
                name = %self.config.name,
                from = %from,
                failures = inner.failure_count,
                "Circuit breaker OPENED"
            ),
            CircuitState::HalfOpen => debug!(
                name = %self.config.name,
                "Circuit breaker transitioning to HALF-OPEN"
            ),
            CircuitState::Closed => {
                inner.failure_count = 0;
                info!(name = %self.config.name, from = %from, "Circuit breaker CLOSED");
            }
        }
    }

    fn publish(&self, inner: &BreakerState) {
        self.published
            .store(pack(inner.state, inner.failure_count), Ordering::Release);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}
