//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are stored as integer milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker settings.
    pub breaker: BreakerSettings,

    /// Retry settings.
    pub retry: RetrySettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Breaker identifier for logs.
    pub name: String,

    /// Consecutive failures before the circuit opens.
    pub max_failures: u32,

    /// Cooldown before a trial call, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl BreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_failures: 3,
            reset_timeout_ms: 5_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retry attempts after the first (0 = single attempt).
    pub max_retries: u32,

    /// Fixed delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl RetrySettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
