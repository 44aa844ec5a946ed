//! Round-robin load balancing strategy.

use crate::load_balancer::{BackendSnapshot, EngineError, Result, Strategy, StrategyKind};

/// Round-robin selector.
///
/// Remembers the last selected id rather than an index, so membership and
/// health changes between calls neither skip nor repeat backends. If the
/// remembered id has left the candidate list, selection restarts at the
/// first candidate.
#[derive(Debug, Default)]
pub struct RoundRobin {
    last: Option<String>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn pick(&mut self, candidates: &[BackendSnapshot]) -> Result<String> {
        if candidates.is_empty() {
            return Err(EngineError::NoBackendsAvailable);
        }

        let next = self
            .last
            .as_deref()
            .and_then(|last| candidates.iter().position(|b| b.id == last))
            .map_or(0, |pos| (pos + 1) % candidates.len());

        let id = candidates[next].id.clone();
        self.last = Some(id.clone());
        Ok(id)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }
}
