//! Read-only statistics.
//!
//! Snapshots are copied out of the registry under the engine lock and are
//! never updated afterwards, so readers cannot race with selections.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::health::state::HealthState;
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics;

/// One row of a stats snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    pub id: String,
    pub connections: u64,
    pub health: HealthState,
    pub weight: u32,
}

/// Immutable point-in-time view of per-backend connection counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    backends: Vec<BackendStats>,
}

impl StatsSnapshot {
    /// Rows in registry order.
    pub fn backends(&self) -> &[BackendStats] {
        &self.backends
    }

    pub fn get(&self, id: &str) -> Option<u64> {
        self.backends
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.connections)
    }

    pub fn total_connections(&self) -> u64 {
        self.backends.iter().map(|b| b.connections).sum()
    }

    /// id → connection count.
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.backends
            .iter()
            .map(|b| (b.id.clone(), b.connections))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Derives aggregate views from the registry.
pub struct StatsReporter;

impl StatsReporter {
    pub fn snapshot(registry: &BackendRegistry) -> StatsSnapshot {
        StatsSnapshot {
            backends: registry
                .iter()
                .map(|b| BackendStats {
                    id: b.id().to_string(),
                    connections: b.active_connections(),
                    health: b.health(),
                    weight: b.weight(),
                })
                .collect(),
        }
    }

    pub fn total_connections(registry: &BackendRegistry) -> u64 {
        registry.iter().map(|b| b.active_connections()).sum()
    }

    /// Push per-backend gauges to the installed metrics recorder.
    pub fn publish(snapshot: &StatsSnapshot) {
        for b in snapshot.backends() {
            metrics::record_backend_connections(&b.id, b.connections);
            metrics::record_backend_health(&b.id, b.health);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::capture::GaugeRecorder;

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut reg = BackendRegistry::new();
        reg.register("a", 1).unwrap();
        reg.register("b", 2).unwrap();
        reg.increment("a").unwrap();

        let snap = StatsReporter::snapshot(&reg);
        reg.increment("a").unwrap();
        reg.increment("b").unwrap();

        assert_eq!(snap.get("a"), Some(1));
        assert_eq!(snap.get("b"), Some(0));
        assert_eq!(snap.total_connections(), 1);
        assert_eq!(StatsReporter::total_connections(&reg), 3);
    }

    #[test]
    fn test_counts_and_serialization() {
        let mut reg = BackendRegistry::new();
        reg.register("ip2", 1).unwrap();
        reg.register("ip1", 1).unwrap();
        reg.increment("ip1").unwrap();

        let snap = StatsReporter::snapshot(&reg);
        let counts = snap.counts();
        assert_eq!(counts.get("ip1"), Some(&1));
        assert_eq!(counts.get("ip2"), Some(&0));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["backends"][0]["id"], "ip2");
        assert_eq!(json["backends"][1]["connections"], 1);
        assert_eq!(json["backends"][1]["health"], "unknown");
    }

    #[test]
    fn test_publish_sets_gauges() {
        let recorder = GaugeRecorder::default();
        let mut reg = BackendRegistry::new();
        reg.register("a", 1).unwrap();
        reg.register("b", 1).unwrap();
        reg.increment("a").unwrap();
        reg.increment("a").unwrap();
        reg.set_health("b", HealthState::Unhealthy).unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            StatsReporter::publish(&StatsReporter::snapshot(&reg));
        });

        assert_eq!(recorder.gauge("balancer_backend_connections", "a"), Some(2.0));
        assert_eq!(recorder.gauge("balancer_backend_connections", "b"), Some(0.0));
        assert_eq!(recorder.gauge("balancer_backend_health", "a"), Some(1.0));
        assert_eq!(recorder.gauge("balancer_backend_health", "b"), Some(0.0));
    }
}
