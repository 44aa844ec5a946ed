//! Backend registry.
//!
//! # Responsibilities
//! - Own the authoritative, insertion-ordered set of backends
//! - O(1) lookup by identifier
//! - Connection accounting and health updates per backend
//! - Produce the candidate list for selection
//!
//! The ordered list and the index always hold the same membership. The
//! registry itself is not synchronized; the engine lock guards it.

use std::collections::HashMap;

use crate::health::state::{HealthState, HealthTransition, Thresholds};
use crate::load_balancer::backend::{Backend, BackendSnapshot};
use crate::load_balancer::error::{EngineError, Result};

#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
    index: HashMap<String, usize>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Add a backend. Never overwrites an existing one.
    pub fn register(&mut self, id: &str, weight: u32) -> Result<()> {
        if self.index.contains_key(id) {
            return Err(EngineError::DuplicateBackend(id.to_string()));
        }
        let backend = Backend::new(id, weight)?;
        self.index.insert(id.to_string(), self.backends.len());
        self.backends.push(backend);
        Ok(())
    }

    /// Remove a backend, returning its last state.
    pub fn deregister(&mut self, id: &str) -> Result<BackendSnapshot> {
        let pos = self
            .index
            .remove(id)
            .ok_or_else(|| EngineError::BackendNotFound(id.to_string()))?;
        let removed = self.backends.remove(pos);

        // Shift indices of everything after the removed slot.
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Ok(removed.snapshot())
    }

    pub fn get(&self, id: &str) -> Result<BackendSnapshot> {
        self.backend(id).map(Backend::snapshot)
    }

    /// Ordered copy of all backends.
    pub fn list(&self) -> Vec<BackendSnapshot> {
        self.backends.iter().map(Backend::snapshot).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    pub fn increment(&mut self, id: &str) -> Result<u64> {
        let backend = self.backend_mut(id)?;
        backend.inc_connections();
        Ok(backend.active_connections())
    }

    pub fn decrement(&mut self, id: &str) -> Result<u64> {
        let backend = self.backend_mut(id)?;
        backend.dec_connections()?;
        Ok(backend.active_connections())
    }

    pub fn set_health(&mut self, id: &str, state: HealthState) -> Result<()> {
        self.backend_mut(id)?.set_health(state);
        Ok(())
    }

    pub fn set_weight(&mut self, id: &str, weight: u32) -> Result<()> {
        self.backend_mut(id)?.set_weight(weight)
    }

    pub fn record_probe(
        &mut self,
        id: &str,
        success: bool,
        thresholds: Thresholds,
    ) -> Result<Option<HealthTransition>> {
        Ok(self.backend_mut(id)?.record_probe(success, thresholds))
    }

    /// Eligible backends in registry order.
    ///
    /// Unhealthy backends are skipped. When nothing is eligible every
    /// registered backend is returned instead (degrade-to-available); the
    /// flag tells the caller that happened.
    pub fn candidates(&self) -> (Vec<BackendSnapshot>, bool) {
        let eligible: Vec<BackendSnapshot> = self
            .backends
            .iter()
            .filter(|b| b.health().is_eligible())
            .map(Backend::snapshot)
            .collect();

        if eligible.is_empty() && !self.backends.is_empty() {
            return (self.list(), true);
        }
        (eligible, false)
    }

    fn backend(&self, id: &str) -> Result<&Backend> {
        self.index
            .get(id)
            .map(|&pos| &self.backends[pos])
            .ok_or_else(|| EngineError::BackendNotFound(id.to_string()))
    }

    fn backend_mut(&mut self, id: &str) -> Result<&mut Backend> {
        match self.index.get(id) {
            Some(&pos) => Ok(&mut self.backends[pos]),
            None => Err(EngineError::BackendNotFound(id.to_string())),
        }
    }
}
