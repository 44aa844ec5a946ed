//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Classify request outcomes reported by the transport layer
//! - Feed them into the same hysteresis as active probes
//!
//! Connection errors, timeouts and 5xx count as failures. 4xx are not:
//! they are the client's fault, not the backend's.

use crate::health::state::{HealthTransition, Thresholds};
use crate::load_balancer::{Engine, Result};

/// What happened to a request forwarded to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Status(u16),
    Timeout,
    ConnectionFailed,
}

impl RequestOutcome {
    pub fn is_failure(self) -> bool {
        match self {
            RequestOutcome::Status(code) => code >= 500,
            RequestOutcome::Timeout | RequestOutcome::ConnectionFailed => true,
        }
    }
}

/// Record an observed request outcome against `id`.
pub fn observe(
    engine: &Engine,
    id: &str,
    outcome: RequestOutcome,
    thresholds: Thresholds,
) -> Result<Option<HealthTransition>> {
    engine.report_probe(id, !outcome.is_failure(), thresholds)
}
