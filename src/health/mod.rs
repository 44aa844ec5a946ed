//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend with an address
//!     → Engine::report_probe
//!
//! Passive health checks (passive.rs):
//!     Request outcome reported by the caller
//!     → Classify as success/failure
//!     → Engine::report_probe
//!
//! State machine (state.rs):
//!     Unknown/Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - State transitions require consecutive successes/failures
//! - Health state is per-backend and lives in the registry

pub mod active;
pub mod passive;
pub mod state;
