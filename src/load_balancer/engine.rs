//! Load balancer engine.
//!
//! # Responsibilities
//! - Own the registry and the active strategy
//! - Run snapshot → pick → increment as one critical section
//! - Mediate membership, health and accounting changes
//!
//! Every public operation takes the same mutex, so operations are
//! linearizable: none of them observes a half-applied change.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::EngineConfig;
use crate::health::state::{HealthState, HealthTransition, Thresholds};
use crate::load_balancer::{
    BackendRegistry, BackendSnapshot, EngineError, Result, StatsReporter, StatsSnapshot,
    Strategy, StrategyKind,
};
use crate::observability::metrics;

#[derive(Debug)]
struct EngineState {
    registry: BackendRegistry,
    strategy: Box<dyn Strategy>,
}

impl EngineState {
    fn select(&mut self) -> Result<String> {
        let (candidates, degraded) = self.registry.candidates();
        if degraded {
            tracing::warn!(
                backends = candidates.len(),
                "No healthy backends, selecting among all registered"
            );
        }

        let kind = self.strategy.kind();
        let id = match self.strategy.pick(&candidates) {
            Ok(id) => id,
            Err(e) => {
                metrics::record_selection_failure(kind);
                tracing::debug!(strategy = %kind, error = %e, "Selection failed");
                return Err(e);
            }
        };

        let active = self.registry.increment(&id)?;
        metrics::record_selection(&id, kind);
        metrics::record_backend_connections(&id, active);
        tracing::debug!(backend = %id, active, strategy = %kind, "Backend selected");
        Ok(id)
    }
}

/// Summary of an [`Engine::apply_config`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub reweighted: Vec<String>,
    pub strategy_changed: bool,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.reweighted.is_empty()
            && !self.strategy_changed
    }
}

/// The backend selection engine.
///
/// Constructed explicitly and shared as `Arc<Engine>`; there is no global
/// instance.
#[derive(Debug)]
pub struct Engine {
    state: Mutex<EngineState>,
}

impl Engine {
    /// Create an engine with the given backends (weight 1 each) in order.
    pub fn new<I, S>(backends: I, strategy: StrategyKind) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = BackendRegistry::new();
        for id in backends {
            registry.register(id.as_ref(), 1)?;
        }
        Ok(Self::with_registry(registry, strategy))
    }

    /// Create an engine from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut registry = BackendRegistry::new();
        for backend in &config.backends {
            registry.register(&backend.id, backend.weight)?;
        }
        tracing::info!(
            backends = registry.len(),
            strategy = %config.strategy,
            "Load balancer engine initialized"
        );
        Ok(Self::with_registry(registry, config.strategy))
    }

    fn with_registry(registry: BackendRegistry, strategy: StrategyKind) -> Self {
        Self {
            state: Mutex::new(EngineState {
                registry,
                strategy: strategy.build(),
            }),
        }
    }

    // Mutations validate before writing, so state behind a poisoned lock
    // is still consistent.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick a backend and count a new connection on it.
    pub fn select(&self) -> Result<String> {
        self.lock().select()
    }

    /// Select, and return the counts as they stand right after the pick.
    pub fn select_with_stats(&self) -> Result<(String, StatsSnapshot)> {
        let mut state = self.lock();
        let id = state.select()?;
        Ok((id, StatsReporter::snapshot(&state.registry)))
    }

    /// Select and hold the connection until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> Result<ConnectionGuard> {
        let id = self.select()?;
        Ok(ConnectionGuard {
            engine: Arc::clone(self),
            id,
        })
    }

    /// Signal that a connection to `id` closed.
    pub fn release(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        match state.registry.decrement(id) {
            Ok(active) => {
                metrics::record_backend_connections(id, active);
                tracing::debug!(backend = %id, active, "Connection released");
                Ok(())
            }
            Err(e @ EngineError::InvariantViolation { .. }) => {
                tracing::error!(backend = %id, error = %e, "Connection accounting out of balance");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Swap the active strategy.
    ///
    /// Takes effect on the next `select()`. Strategy-local state is
    /// discarded: the round-robin cursor restarts at the first backend and
    /// weighted counters start from zero. Connection counts are untouched.
    pub fn set_strategy(&self, kind: StrategyKind) {
        let mut state = self.lock();
        let previous = state.strategy.kind();
        state.strategy = kind.build();
        tracing::info!(from = %previous, to = %kind, "Strategy changed");
    }

    /// [`set_strategy`](Self::set_strategy) from a free-text name.
    pub fn set_strategy_by_name(&self, name: &str) -> Result<StrategyKind> {
        let kind: StrategyKind = name.parse()?;
        self.set_strategy(kind);
        Ok(kind)
    }

    pub fn strategy(&self) -> StrategyKind {
        self.lock().strategy.kind()
    }

    pub fn add_backend(&self, id: &str, weight: u32) -> Result<()> {
        self.lock().registry.register(id, weight)?;
        tracing::info!(backend = %id, weight, "Backend registered");
        Ok(())
    }

    /// Register `id` unless it already exists. Returns whether it was added.
    pub fn ensure_backend(&self, id: &str, weight: u32) -> Result<bool> {
        let mut state = self.lock();
        if state.registry.contains(id) {
            return Ok(false);
        }
        state.registry.register(id, weight)?;
        tracing::info!(backend = %id, weight, "Backend registered");
        Ok(true)
    }

    /// Deregister a backend. Outstanding connections on it are dropped
    /// from the books; later `release` calls for it fail with not-found.
    pub fn remove_backend(&self, id: &str) -> Result<BackendSnapshot> {
        let removed = self.lock().registry.deregister(id)?;
        metrics::record_backend_removed(id);
        if removed.active_connections > 0 {
            tracing::warn!(
                backend = %id,
                active = removed.active_connections,
                "Backend deregistered with active connections"
            );
        } else {
            tracing::info!(backend = %id, "Backend deregistered");
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<BackendSnapshot> {
        self.lock().registry.get(id)
    }

    pub fn list(&self) -> Vec<BackendSnapshot> {
        self.lock().registry.list()
    }

    /// Override the health of a backend.
    pub fn set_health(&self, id: &str, status: HealthState) -> Result<()> {
        self.lock().registry.set_health(id, status)?;
        metrics::record_backend_health(id, status);
        tracing::info!(backend = %id, health = ?status, "Health set");
        Ok(())
    }

    /// Feed a probe outcome through the backend's hysteresis.
    pub fn report_probe(
        &self,
        id: &str,
        success: bool,
        thresholds: Thresholds,
    ) -> Result<Option<HealthTransition>> {
        let transition = self.lock().registry.record_probe(id, success, thresholds)?;
        if let Some(t) = transition {
            metrics::record_backend_health(id, t.to);
            if t.to == HealthState::Unhealthy {
                tracing::warn!(backend = %id, from = ?t.from, "Backend marked unhealthy");
            } else {
                tracing::info!(backend = %id, from = ?t.from, to = ?t.to, "Backend health changed");
            }
        }
        Ok(transition)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsReporter::snapshot(&self.lock().registry)
    }

    pub fn total_connections(&self) -> u64 {
        StatsReporter::total_connections(&self.lock().registry)
    }

    /// Reconcile membership, weights and strategy with a reloaded config.
    ///
    /// The config is checked first; on error nothing is changed. Surviving
    /// backends keep their counts and health.
    pub fn apply_config(&self, config: &EngineConfig) -> Result<ReloadSummary> {
        let mut wanted = HashSet::new();
        for backend in &config.backends {
            if backend.id.is_empty() {
                return Err(EngineError::InvalidBackendId);
            }
            if backend.weight == 0 {
                return Err(EngineError::InvalidWeight {
                    id: backend.id.clone(),
                    weight: backend.weight,
                });
            }
            if !wanted.insert(backend.id.as_str()) {
                return Err(EngineError::DuplicateBackend(backend.id.clone()));
            }
        }

        let mut state = self.lock();
        let mut summary = ReloadSummary::default();

        let stale: Vec<String> = state
            .registry
            .iter()
            .map(|b| b.id().to_string())
            .filter(|id| !wanted.contains(id.as_str()))
            .collect();
        for id in stale {
            state.registry.deregister(&id)?;
            metrics::record_backend_removed(&id);
            summary.removed.push(id);
        }

        for backend in &config.backends {
            match state.registry.get(&backend.id) {
                Ok(existing) if existing.weight != backend.weight => {
                    state.registry.set_weight(&backend.id, backend.weight)?;
                    summary.reweighted.push(backend.id.clone());
                }
                Ok(_) => {}
                Err(_) => {
                    state.registry.register(&backend.id, backend.weight)?;
                    summary.added.push(backend.id.clone());
                }
            }
        }

        if state.strategy.kind() != config.strategy {
            state.strategy = config.strategy.build();
            summary.strategy_changed = true;
        }

        tracing::info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            reweighted = summary.reweighted.len(),
            strategy = %config.strategy,
            "Engine configuration applied"
        );
        Ok(summary)
    }
}

/// A RAII guard that releases its connection on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    engine: Arc<Engine>,
    id: String,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Deref for ConnectionGuard {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.engine.release(&self.id) {
            // backend may have been deregistered meanwhile
            tracing::debug!(backend = %self.id, error = %e, "Guard release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::observability::metrics::capture::GaugeRecorder;

    fn engine(ids: &[&str], strategy: StrategyKind) -> Engine {
        Engine::new(ids.iter().copied(), strategy).unwrap()
    }

    #[test]
    fn test_round_robin_example() {
        let lb = engine(&["A", "B", "C"], StrategyKind::RoundRobin);
        let picks: Vec<String> = (0..4).map(|_| lb.select().unwrap()).collect();
        assert_eq!(picks, vec!["A", "B", "C", "A"]);
        assert_eq!(lb.total_connections(), 4);
    }

    #[test]
    fn test_least_connections_example() {
        let lb = engine(&["A", "B"], StrategyKind::RoundRobin);
        for _ in 0..5 {
            lb.lock().registry.increment("B").unwrap();
        }
        lb.set_strategy(StrategyKind::LeastConnections);
        assert_eq!(lb.select().unwrap(), "A");
    }

    #[test]
    fn test_empty_engine() {
        let lb = engine(&[], StrategyKind::LeastConnections);
        assert_eq!(lb.select().unwrap_err(), EngineError::NoBackendsAvailable);

        let lb = engine(&["A"], StrategyKind::Random);
        lb.remove_backend("A").unwrap();
        assert_eq!(lb.select().unwrap_err(), EngineError::NoBackendsAvailable);
    }

    #[test]
    fn test_release_policy() {
        let lb = engine(&["A"], StrategyKind::RoundRobin);
        assert!(matches!(
            lb.release("A"),
            Err(EngineError::InvariantViolation { .. })
        ));
        assert_eq!(
            lb.release("nope").unwrap_err(),
            EngineError::BackendNotFound("nope".into())
        );

        lb.select().unwrap();
        lb.release("A").unwrap();
        assert_eq!(lb.get("A").unwrap().active_connections, 0);
    }

    #[test]
    fn test_unhealthy_excluded_then_degrade() {
        let lb = engine(&["A", "B"], StrategyKind::RoundRobin);
        lb.set_health("A", HealthState::Unhealthy).unwrap();
        assert_eq!(lb.select().unwrap(), "B");
        assert_eq!(lb.select().unwrap(), "B");

        lb.set_health("B", HealthState::Unhealthy).unwrap();
        // nothing healthy: fall back to all registered, rotation continues after B
        let picks: Vec<String> = (0..3).map(|_| lb.select().unwrap()).collect();
        assert_eq!(picks, vec!["A", "B", "A"]);
        assert_eq!(lb.get("A").unwrap().active_connections, 2);
    }

    #[test]
    fn test_strategy_swap_resets_cursor() {
        let lb = engine(&["A", "B", "C"], StrategyKind::RoundRobin);
        lb.select().unwrap();
        lb.select().unwrap();

        lb.set_strategy(StrategyKind::RoundRobin);
        assert_eq!(lb.select().unwrap(), "A");
        assert_eq!(lb.total_connections(), 3);
    }

    #[test]
    fn test_set_strategy_by_name() {
        let lb = engine(&["A"], StrategyKind::RoundRobin);
        assert_eq!(
            lb.set_strategy_by_name("least_connections").unwrap(),
            StrategyKind::LeastConnections
        );
        assert_eq!(lb.strategy(), StrategyKind::LeastConnections);

        let err = lb.set_strategy_by_name("bogus").unwrap_err();
        assert_eq!(err, EngineError::UnknownStrategy("bogus".into()));
        assert_eq!(lb.strategy(), StrategyKind::LeastConnections);
    }

    #[test]
    fn test_ensure_backend() {
        let lb = engine(&["A"], StrategyKind::RoundRobin);
        assert!(!lb.ensure_backend("A", 1).unwrap());
        assert!(lb.ensure_backend("B", 2).unwrap());
        assert_eq!(
            lb.add_backend("B", 1).unwrap_err(),
            EngineError::DuplicateBackend("B".into())
        );
    }

    #[test]
    fn test_select_with_stats() {
        let lb = engine(&["A", "B"], StrategyKind::RoundRobin);
        let (id, stats) = lb.select_with_stats().unwrap();
        assert_eq!(id, "A");
        assert_eq!(stats.get("A"), Some(1));
        assert_eq!(stats.get("B"), Some(0));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lb = Arc::new(engine(&["A", "B"], StrategyKind::RoundRobin));
        {
            let guard = lb.acquire().unwrap();
            assert_eq!(guard.id(), "A");
            assert_eq!(lb.total_connections(), 1);
        }
        assert_eq!(lb.total_connections(), 0);

        // dropping after deregistration is harmless
        let guard = lb.acquire().unwrap();
        lb.remove_backend(guard.id()).unwrap();
        drop(guard);
        assert_eq!(lb.total_connections(), 0);
    }

    #[test]
    fn test_report_probe_transitions() {
        let lb = engine(&["A", "B"], StrategyKind::RoundRobin);
        let t = Thresholds { healthy: 1, unhealthy: 2 };

        assert_eq!(lb.report_probe("A", false, t).unwrap(), None);
        let transition = lb.report_probe("A", false, t).unwrap().unwrap();
        assert_eq!(transition.to, HealthState::Unhealthy);
        assert_eq!(lb.select().unwrap(), "B");

        lb.report_probe("A", true, t).unwrap();
        assert_eq!(lb.get("A").unwrap().health, HealthState::Healthy);
    }

    #[test]
    fn test_apply_config() {
        let lb = engine(&["A", "B", "C"], StrategyKind::RoundRobin);
        lb.select().unwrap(); // A holds one connection

        let config = EngineConfig {
            strategy: StrategyKind::WeightedRoundRobin,
            backends: vec![
                BackendConfig::new("A", 3),
                BackendConfig::new("C", 1),
                BackendConfig::new("D", 2),
            ],
            ..EngineConfig::default()
        };
        let summary = lb.apply_config(&config).unwrap();

        assert_eq!(summary.added, vec!["D"]);
        assert_eq!(summary.removed, vec!["B"]);
        assert_eq!(summary.reweighted, vec!["A"]);
        assert!(summary.strategy_changed);

        let ids: Vec<String> = lb.list().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["A", "C", "D"]);
        assert_eq!(lb.get("A").unwrap().active_connections, 1);
        assert_eq!(lb.strategy(), StrategyKind::WeightedRoundRobin);

        assert!(lb.apply_config(&config).unwrap().is_noop());
    }

    #[test]
    fn test_connection_gauge_follows_accounting() {
        let recorder = GaugeRecorder::default();
        let gauge = |id: &str| recorder.gauge("balancer_backend_connections", id);

        ::metrics::with_local_recorder(&recorder, || {
            let lb = engine(&["A", "B"], StrategyKind::LeastConnections);
            for _ in 0..3 {
                lb.select().unwrap();
            }
            // A, B, A
            assert_eq!(gauge("A"), Some(2.0));
            assert_eq!(gauge("B"), Some(1.0));

            lb.release("A").unwrap();
            assert_eq!(gauge("A"), Some(1.0));

            lb.remove_backend("A").unwrap();
            assert_eq!(gauge("A"), Some(0.0));

            lb.select().unwrap();
            let config = EngineConfig {
                backends: vec![BackendConfig::new("C", 1)],
                ..EngineConfig::default()
            };
            lb.apply_config(&config).unwrap();
            assert_eq!(gauge("B"), Some(0.0));
        });
    }

    #[test]
    fn test_apply_config_rejects_without_changes() {
        let lb = engine(&["A"], StrategyKind::RoundRobin);
        let config = EngineConfig {
            backends: vec![BackendConfig::new("B", 1), BackendConfig::new("B", 1)],
            ..EngineConfig::default()
        };
        assert_eq!(
            lb.apply_config(&config).unwrap_err(),
            EngineError::DuplicateBackend("B".into())
        );
        assert_eq!(lb.list().len(), 1);
    }
}
