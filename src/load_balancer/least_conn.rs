//! Least Connections load balancing strategy.

use crate::load_balancer::{BackendSnapshot, EngineError, Result, Strategy, StrategyKind};

/// Least connections selector.
/// Selects the backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeastConnections {
    fn pick(&mut self, candidates: &[BackendSnapshot]) -> Result<String> {
        // min_by_key keeps the first of equal minima: ties go to insertion order
        candidates
            .iter()
            .min_by_key(|b| b.active_connections)
            .map(|b| b.id.clone())
            .ok_or(EngineError::NoBackendsAvailable)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastConnections
    }
}
