//! Cooperative cancellation for guarded calls.
//!
//! A [`CallContext`] pairs a [`CancellationToken`] with an optional deadline.
//! It is checked before each attempt and raced against retry delays. It never
//! interrupts an operation that is already running.

use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelCause {
    /// `cancel()` was called on the context or one of its ancestors.
    #[error("context cancelled")]
    Cancelled,
    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal handed to [`RetryableService::call_with_retry`].
///
/// Cloning is cheap and clones share the same signal.
///
/// [`RetryableService::call_with_retry`]: crate::resilience::RetryableService::call_with_retry
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that only finishes when cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one owned by a shutdown coordinator.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now. Keeps an earlier existing deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Add an absolute deadline. Keeps an earlier existing deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled together with this one that can be cancelled on its
    /// own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    ///
    /// Explicit cancellation is reported over an expired deadline.
    pub fn cause(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Wait until the context is done.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelCause::Cancelled,
                _ = sleep_until(deadline) => CancelCause::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelCause::Cancelled
            }
        }
    }
}

impl From<CancellationToken> for CallContext {
    fn from(token: CancellationToken) -> Self {
        Self::from_token(token)
    }
}
