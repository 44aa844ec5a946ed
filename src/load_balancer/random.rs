//! Random load balancing strategy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{BackendSnapshot, EngineError, Result, Strategy, StrategyKind};

/// Uniform random selector. Each call is independent.
#[derive(Debug)]
pub struct RandomPick {
    rng: StdRng,
}

impl RandomPick {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests and simulations.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPick {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RandomPick {
    fn pick(&mut self, candidates: &[BackendSnapshot]) -> Result<String> {
        if candidates.is_empty() {
            return Err(EngineError::NoBackendsAvailable);
        }
        let idx = self.rng.gen_range(0..candidates.len());
        Ok(candidates[idx].id.clone())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthState;
    use std::collections::HashMap;

    fn backends(ids: &[&str]) -> Vec<BackendSnapshot> {
        ids.iter()
            .map(|id| BackendSnapshot {
                id: id.to_string(),
                weight: 1,
                active_connections: 0,
                health: HealthState::Healthy,
            })
            .collect()
    }

    #[test]
    fn test_random_covers_all_candidates() {
        let mut lb = RandomPick::with_seed(7);
        let list = backends(&["a", "b", "c"]);

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..3000 {
            *counts.entry(lb.pick(&list).unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            // expected 1000 each
            assert!(*count > 800 && *count < 1200, "counts: {:?}", counts);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let list = backends(&["a", "b", "c", "d"]);
        let mut x = RandomPick::with_seed(42);
        let mut y = RandomPick::with_seed(42);
        for _ in 0..20 {
            assert_eq!(x.pick(&list).unwrap(), y.pick(&list).unwrap());
        }
    }

    #[test]
    fn test_empty() {
        let mut lb = RandomPick::with_seed(1);
        assert_eq!(lb.pick(&[]).unwrap_err(), EngineError::NoBackendsAvailable);
    }
}
