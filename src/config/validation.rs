//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend ids unique and non-empty, weights positive
//! - Probe addresses and the metrics address parse
//! - Health check timings and thresholds non-zero
//!
//! Returns all validation errors, not just the first.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::EngineConfig;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if backend.id.is_empty() {
            errors.push(ValidationError::new(&field, "id must not be empty"));
        } else if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate id '{}'", backend.id),
            ));
        }
        if backend.weight == 0 {
            errors.push(ValidationError::new(&field, "weight must be at least 1"));
        }
        if let Some(address) = &backend.address {
            if address.parse::<SocketAddr>().is_err() {
                errors.push(ValidationError::new(
                    &field,
                    format!("invalid address '{}'", address),
                ));
            }
        }
    }

    let hc = &config.health_check;
    if hc.enabled {
        if hc.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be > 0"));
        }
        if hc.timeout_secs == 0 {
            errors.push(ValidationError::new("health_check.timeout_secs", "must be > 0"));
        }
        if hc.healthy_threshold == 0 {
            errors.push(ValidationError::new("health_check.healthy_threshold", "must be > 0"));
        }
        if hc.unhealthy_threshold == 0 {
            errors.push(ValidationError::new("health_check.unhealthy_threshold", "must be > 0"));
        }
        if !hc.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid address '{}'", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn test_placeholder_is_valid() {
        assert!(validate_config(&EngineConfig::placeholder()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.backends = vec![
            BackendConfig::new("a", 1),
            BackendConfig::new("a", 0),
            BackendConfig::new("", 1).with_address("not-an-address"),
        ];
        config.health_check.interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "backends[1]",
                "backends[1]",
                "backends[2]",
                "backends[2]",
                "health_check.interval_secs"
            ]
        );
        assert_eq!(errors[0].to_string(), "backends[1]: duplicate id 'a'");
    }

    #[test]
    fn test_disabled_health_check_skips_timing_checks() {
        let mut config = EngineConfig::placeholder();
        config.health_check.enabled = false;
        config.health_check.interval_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
