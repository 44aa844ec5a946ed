//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build engine → Start background tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Background tasks exit → Final stats
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then engine, then background tasks
//! - The engine is owned by the host, never a global

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
