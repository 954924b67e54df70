//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the authentication gate.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, client address trust).
    pub listener: ListenerConfig,

    /// Event journal settings.
    pub journal: JournalConfig,

    /// Failure rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Simulation and inspection endpoints.
    pub admin: AdminConfig,

    /// Username to password table for the built-in authenticator.
    pub users: BTreeMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            journal: JournalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            admin: AdminConfig::default(),
            users: default_users(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Lab accounts shipped with the default configuration.
fn default_users() -> BTreeMap<String, String> {
    [("alice", "alice123"), ("bob", "bob123"), ("admin", "admin123")]
        .into_iter()
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .collect()
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Take the source identity from the first X-Forwarded-For entry
    /// instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            trust_forwarded_for: true,
        }
    }
}

/// Event journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct JournalConfig {
    /// Maximum number of retained events. Not reloadable.
    pub capacity: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Trailing window length in seconds.
    pub window_secs: u64,

    /// Failures within the window at which a source is refused.
    pub threshold: usize,

    /// How often idle sources are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Empty windows are evicted after this many windows without activity.
    pub idle_multiplier: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            threshold: 1000,
            sweep_interval_secs: 60,
            idle_multiplier: 2,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}

/// Simulation and admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Shared secret expected in the X-Demo-Secret header.
    pub demo_secret: String,

    /// Principal recorded on simulated failures.
    pub simulated_principal: String,

    /// User agent recorded on simulated failures.
    pub simulated_agent: String,

    /// Largest count a single simulate call may request.
    pub max_simulated: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Override with DEMO_SECRET.
            demo_secret: "changeme".to_string(),
            simulated_principal: "alice".to_string(),
            simulated_agent: "DemoAttack/1.0".to_string(),
            max_simulated: 500,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
