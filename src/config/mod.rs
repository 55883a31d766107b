//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → RetryableService::from_config / init_logging
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::BreakerSettings;
pub use schema::ObservabilityConfig;
pub use schema::ResilienceConfig;
pub use schema::RetrySettings;
pub use validation::ValidationError;
