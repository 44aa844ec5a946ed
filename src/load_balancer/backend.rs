//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single selectable target
//! - Track active connections (for Least Connections LB)
//! - Track health state and probe hysteresis
//!
//! Backends live inside the registry behind the engine lock, so plain
//! integers are enough here. Everything handed out is a [`BackendSnapshot`].

use serde::Serialize;

use crate::health::state::{HealthState, HealthTracker, HealthTransition, Thresholds};
use crate::load_balancer::error::{EngineError, Result};

/// A single backend as stored in the registry.
#[derive(Debug, Clone)]
pub struct Backend {
    id: String,
    weight: u32,
    active_connections: u64,
    health: HealthState,
    tracker: HealthTracker,
}

impl Backend {
    /// Create a new backend with zero connections and Unknown health.
    pub fn new(id: impl Into<String>, weight: u32) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::InvalidBackendId);
        }
        if weight == 0 {
            return Err(EngineError::InvalidWeight { id, weight });
        }
        Ok(Self {
            id,
            weight,
            active_connections: 0,
            health: HealthState::Unknown,
            tracker: HealthTracker::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections
    }

    pub fn health(&self) -> HealthState {
        self.health
    }

    pub fn set_weight(&mut self, weight: u32) -> Result<()> {
        if weight == 0 {
            return Err(EngineError::InvalidWeight {
                id: self.id.clone(),
                weight,
            });
        }
        self.weight = weight;
        Ok(())
    }

    /// Increment active connection count.
    pub fn inc_connections(&mut self) {
        self.active_connections += 1;
    }

    /// Decrement active connection count. Fails instead of wrapping at zero.
    pub fn dec_connections(&mut self) -> Result<()> {
        if self.active_connections == 0 {
            return Err(EngineError::InvariantViolation {
                id: self.id.clone(),
                reason: "release without a matching selection (count already 0)".to_string(),
            });
        }
        self.active_connections -= 1;
        Ok(())
    }

    /// Set health explicitly, discarding accumulated probe streaks.
    pub fn set_health(&mut self, state: HealthState) {
        self.health = state;
        self.tracker.reset();
    }

    /// Feed one probe outcome through the hysteresis tracker.
    pub fn record_probe(&mut self, success: bool, thresholds: Thresholds) -> Option<HealthTransition> {
        let from = self.health;
        let next = if success {
            self.tracker.mark_success(from, thresholds)
        } else {
            self.tracker.mark_failure(from, thresholds)
        };

        next.map(|to| {
            self.health = to;
            HealthTransition { from, to }
        })
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            id: self.id.clone(),
            weight: self.weight,
            active_connections: self.active_connections,
            health: self.health,
        }
    }
}

/// Point-in-time copy of a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSnapshot {
    pub id: String,
    pub weight: u32,
    pub active_connections: u64,
    pub health: HealthState,
}
