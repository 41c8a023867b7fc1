//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window size, timeouts, queue depth > 0)
//! - Reject unknown log levels before the subscriber is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{GatewayConfig, WatchMode};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("body.buffer_size must be greater than zero")]
    ZeroBufferSize,

    #[error("body.watch.poll_interval_ms must be greater than zero in poll mode")]
    ZeroPollInterval,

    #[error("inspect.timeout_secs must be greater than zero")]
    ZeroInspectTimeout,

    #[error("inspect.queue_capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.body.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }

    if config.body.watch.mode == WatchMode::Poll && config.body.watch.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if config.inspect.timeout_secs == 0 {
        errors.push(ValidationError::ZeroInspectTimeout);
    }

    if config.inspect.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
