//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! caller → retries.rs RetryableService::call_with_retry(ctx, op)
//!     → context.rs (stop if ctx is done)
//!     → circuit_breaker.rs CircuitBreaker::execute(op)
//!         → Open: fail fast with CircuitOpenError (not retried)
//!         → otherwise: run op, record success/failure
//!     → on failure: wait retry_delay or until ctx is done, then loop
//!     → error.rs (RetriesExhausted / Cancelled / CircuitOpen)
//! ```
//!
//! # Design Decisions
//! - The breaker never retries; the service owns retry policy
//! - Operation errors pass through unchanged
//! - No background tasks; all timing is checked on the call path

pub mod circuit_breaker;
pub mod context;
pub mod error;
pub mod retries;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use context::{CallContext, CancelCause};
pub use error::{BreakerError, CircuitOpenError, RetryError};
pub use retries::RetryableService;
