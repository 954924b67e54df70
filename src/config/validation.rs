//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, window > 0, threshold >= 1)
//! - Validate addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::security::rate_limit::LimitPolicy;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    Address { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("rate_limit: {0}")]
    Policy(String),

    #[error("admin.demo_secret must not be empty")]
    EmptySecret,

    #[error("users: empty username")]
    EmptyUsername,
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let nonzero = [
        ("journal.capacity", config.journal.capacity as u64),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("security.max_body_size", config.security.max_body_size as u64),
        ("admin.max_simulated", config.admin.max_simulated as u64),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if let Err(e) = LimitPolicy::with_idle_multiplier(
        Duration::from_secs(config.rate_limit.window_secs),
        config.rate_limit.threshold,
        config.rate_limit.idle_multiplier,
    ) {
        errors.push(ValidationError::Policy(e.to_string()));
    }

    if config.admin.demo_secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }

    if config.users.keys().any(|user| user.is_empty()) {
        errors.push(ValidationError::EmptyUsername);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
