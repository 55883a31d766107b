//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → cancel CallContext → in-progress retry loops stop
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative; operations already running finish
//! - The signal task exits when the context finishes for any reason

pub mod signals;

pub use signals::cancel_on_ctrl_c;
