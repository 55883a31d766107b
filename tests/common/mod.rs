//! Shared scripted operations for integration tests.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error returned by [`FlakyOperation`], carrying the invocation number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation failed on invocation {0}")]
pub struct OpError(pub u32);

/// An operation that fails for its first `fail_first` invocations and then
/// succeeds, counting invocations and peak concurrency.
#[derive(Debug, Clone, Default)]
pub struct FlakyOperation {
    calls: Arc<AtomicU32>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    fail_first: u32,
    latency: Duration,
}

#[allow(dead_code)]
impl FlakyOperation {
    pub fn failing_first(fail_first: u32) -> Self {
        Self {
            fail_first,
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn always_succeeding() -> Self {
        Self::failing_first(0)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Invocations so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of invocations that were running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn invoke(&self) -> impl Future<Output = Result<u32, OpError>> + Send + 'static {
        let this = self.clone();
        async move {
            let n = this.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let running = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            this.peak_in_flight.fetch_max(running, Ordering::SeqCst);

            if !this.latency.is_zero() {
                tokio::time::sleep(this.latency).await;
            }

            this.in_flight.fetch_sub(1, Ordering::SeqCst);
            if n <= this.fail_first {
                Err(OpError(n))
            } else {
                Ok(n)
            }
        }
    }
}
