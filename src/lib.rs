//! Resilient call execution: a circuit breaker plus a retrying,
//! cancellation-aware invoker built on it.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ResilienceConfig;
pub use resilience::{
    BreakerError, CallContext, CancelCause, CircuitBreaker, CircuitOpenError, CircuitState,
    RetryError, RetryableService,
};
