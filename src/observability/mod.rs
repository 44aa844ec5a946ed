//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine, health monitor, config watcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metrics calls are no-ops until a recorder is installed, so the
//!   library can be embedded without the exporter

pub mod logging;
pub mod metrics;
