//! Error taxonomy for guarded calls.
//!
//! Operation errors are carried through untouched. Only the conditions this
//! layer creates itself (open circuit, cancellation, exhausted retries) get
//! their own variants so callers can match on them.

use std::time::Duration;
use thiserror::Error;

use crate::resilience::context::CancelCause;

/// The breaker is open and its cooldown has not elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is open, retry in {retry_after:?}")]
pub struct CircuitOpenError {
    /// Name of the breaker that rejected the call.
    pub name: String,
    /// Cooldown left before the breaker admits a trial call.
    pub retry_after: Duration,
}

/// Result error of a single [`CircuitBreaker::execute`] call.
///
/// [`CircuitBreaker::execute`]: crate::resilience::CircuitBreaker::execute
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation ran and returned this error.
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The operation's own error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Open(_) => None,
        }
    }
}

/// Terminal error of [`RetryableService::call_with_retry`].
///
/// [`RetryableService::call_with_retry`]: crate::resilience::RetryableService::call_with_retry
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The breaker rejected an attempt. Never retried.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The caller's context finished before an attempt or during a retry delay.
    #[error("call cancelled after {attempts} attempt(s): {cause}")]
    Cancelled {
        attempts: u32,
        #[source]
        cause: CancelCause,
    },

    /// Every attempt failed.
    #[error("retries exhausted after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: E,
    },
}

impl<E> RetryError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Number of operation attempts that were made, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Cancelled { attempts, .. } | Self::Exhausted { attempts, .. } => Some(*attempts),
            Self::CircuitOpen(_) => None,
        }
    }

    /// The last operation error, for exhausted calls.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}
