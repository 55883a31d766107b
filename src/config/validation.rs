//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ResilienceConfig;

/// Upper bound on `retry.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 1_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.breaker.name.trim().is_empty() {
        errors.push(ValidationError::new("breaker.name", "must not be empty"));
    }

    if config.breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "breaker.reset_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.retry.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "retry.max_retries",
            format!("must be at most {MAX_RETRIES_LIMIT}, got {}", config.retry.max_retries),
        ));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
