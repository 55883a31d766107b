//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience subsystem produces:
//!     → tracing events (breaker transitions, retry decisions)
//!     → spans (one per call_with_retry, tagged with a call id)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → or whatever subscriber the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits events; installing a subscriber is the host's call
//! - Call id flows through every event of a retried call
//! - RUST_LOG overrides the configured level

pub mod logging;

pub use logging::init_logging;
