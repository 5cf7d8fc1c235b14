//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, object limit within cache limit)
//! - Check addresses parse before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cache.max_cache_size must be greater than zero")]
    ZeroCacheSize,

    #[error("cache.max_object_size must be greater than zero")]
    ZeroObjectSize,

    #[error("cache.max_object_size ({object}) exceeds cache.max_cache_size ({cache})")]
    ObjectLargerThanCache { object: usize, cache: usize },

    #[error("limits.max_line_bytes must be greater than zero")]
    ZeroLineLimit,

    #[error("limits.max_header_lines must be greater than zero")]
    ZeroHeaderLimit,

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),

    #[error("observability.log_format must be \"full\" or \"compact\", got {0:?}")]
    UnknownLogFormat(String),
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cache = &config.cache;
    if cache.max_cache_size == 0 {
        errors.push(ValidationError::ZeroCacheSize);
    }
    if cache.max_object_size == 0 {
        errors.push(ValidationError::ZeroObjectSize);
    }
    if cache.max_object_size > cache.max_cache_size {
        errors.push(ValidationError::ObjectLargerThanCache {
            object: cache.max_object_size,
            cache: cache.max_cache_size,
        });
    }

    if config.limits.max_line_bytes == 0 {
        errors.push(ValidationError::ZeroLineLimit);
    }
    if config.limits.max_header_lines == 0 {
        errors.push(ValidationError::ZeroHeaderLimit);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }
    if !matches!(obs.log_format.as_str(), "full" | "compact") {
        errors.push(ValidationError::UnknownLogFormat(obs.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
