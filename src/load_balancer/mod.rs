//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! caller → engine.rs (take the engine lock)
//!     → registry.rs (snapshot eligible candidates)
//!     → Apply the active strategy:
//!         - round_robin.rs (advance past the last selected id)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (fewest active connections)
//!         - weighted.rs (smooth weighted round-robin)
//!     → registry.rs (increment the chosen backend)
//!     → Return backend id or error
//! ```
//!
//! # Design Decisions
//! - One lock guards membership, counts and strategy state together
//! - Strategies are a closed set chosen by [`StrategyKind`]
//! - Unhealthy backends excluded unless nothing else is left
//! - Stats are copies, never live views

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod engine;
pub mod error;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod stats;
pub mod weighted;

pub use backend::BackendSnapshot;
pub use engine::{ConnectionGuard, Engine, ReloadSummary};
pub use error::{EngineError, Result};
pub use registry::BackendRegistry;
pub use stats::{StatsReporter, StatsSnapshot};

use crate::load_balancer::{
    least_conn::LeastConnections, random::RandomPick, round_robin::RoundRobin,
    weighted::WeightedRoundRobin,
};

/// Selection policy over an ordered candidate list.
///
/// Candidates are already filtered for health. Implementations return
/// [`EngineError::NoBackendsAvailable`] when the list is empty.
pub trait Strategy: fmt::Debug + Send {
    fn pick(&mut self, candidates: &[BackendSnapshot]) -> Result<String>;

    fn kind(&self) -> StrategyKind;
}

/// The known strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Random,
    LeastConnections,
    WeightedRoundRobin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::RoundRobin,
        StrategyKind::Random,
        StrategyKind::LeastConnections,
        StrategyKind::WeightedRoundRobin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::Random => "random",
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::WeightedRoundRobin => "weighted_round_robin",
        }
    }

    /// Fresh strategy instance with empty local state.
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
            StrategyKind::Random => Box::new(RandomPick::new()),
            StrategyKind::LeastConnections => Box::new(LeastConnections::new()),
            StrategyKind::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| EngineError::UnknownStrategy(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!("round_robin".parse::<StrategyKind>().unwrap(), StrategyKind::RoundRobin);
        assert_eq!("Least-Connections".parse::<StrategyKind>().unwrap(), StrategyKind::LeastConnections);
        assert_eq!("random".parse::<StrategyKind>().unwrap(), StrategyKind::Random);
        assert_eq!(
            "weighted-round-robin".parse::<StrategyKind>().unwrap(),
            StrategyKind::WeightedRoundRobin
        );
    }

    #[test]
    fn test_unknown_strategy() {
        let err = "fastest".parse::<StrategyKind>().unwrap_err();
        assert_eq!(err, EngineError::UnknownStrategy("fastest".into()));
    }

    #[test]
    fn test_build_matches_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.build().kind(), kind);
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
    }
}
