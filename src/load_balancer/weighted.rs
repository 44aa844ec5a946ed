//! Weighted round-robin load balancing strategy.
//!
//! Smooth deficit-counter variant: on every pick each candidate's counter
//! grows by its weight, the largest counter wins and the winner pays back
//! the total weight. Over any window of `Σweights` picks each backend is
//! chosen exactly `weight` times, and picks of a heavy backend are spread
//! out instead of bunched.

use std::collections::HashMap;

use crate::load_balancer::{BackendSnapshot, EngineError, Result, Strategy, StrategyKind};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    counters: HashMap<String, i64>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for WeightedRoundRobin {
    fn pick(&mut self, candidates: &[BackendSnapshot]) -> Result<String> {
        if candidates.is_empty() {
            return Err(EngineError::NoBackendsAvailable);
        }

        // Forget backends that left the candidate set.
        self.counters
            .retain(|id, _| candidates.iter().any(|b| &b.id == id));

        let total: i64 = candidates.iter().map(|b| i64::from(b.weight)).sum();
        let mut best: Option<(&str, i64)> = None;

        for backend in candidates {
            let counter = self.counters.entry(backend.id.clone()).or_insert(0);
            *counter += i64::from(backend.weight);
            // strict > keeps the first of equal counters
            if best.map_or(true, |(_, c)| *counter > c) {
                best = Some((backend.id.as_str(), *counter));
            }
        }

        let (id, _) = best.ok_or(EngineError::NoBackendsAvailable)?;
        if let Some(counter) = self.counters.get_mut(id) {
            *counter -= total;
        }
        Ok(id.to_string())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedRoundRobin
    }
}
