//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine
//! host. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

use crate::health::state::Thresholds;
use crate::load_balancer::StrategyKind;

/// Root configuration.
///
/// Supplied once at construction; a reload produces a whole new value
/// that the engine reconciles against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy active at startup.
    pub strategy: StrategyKind,

    /// Initial backend set, in selection order.
    pub backends: Vec<BackendConfig>,

    /// Active health probing.
    pub health_check: HealthCheckConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Three placeholder backends under round-robin, used when no config
    /// file is given.
    pub fn placeholder() -> Self {
        Self {
            backends: ["ip1", "ip2", "ip3"]
                .into_iter()
                .map(|id| BackendConfig::new(id, 1))
                .collect(),
            ..Self::default()
        }
    }
}

/// Backend definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Optional probe address (e.g., "127.0.0.1:3000"). Backends without
    /// one are never probed.
    #[serde(default)]
    pub address: Option<String>,
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            weight,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            healthy: self.healthy_threshold,
            unhealthy: self.unhealthy_threshold,
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 2,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
