//! Backend selection and connection-accounting engine for a software
//! load balancer.
//!
//! The [`Engine`] owns a registry of backends and one active selection
//! strategy. Callers `select()` a backend per request and `release()` it
//! when the request ends; counts, health and strategy changes are all
//! serialized behind a single lock.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::EngineConfig;
pub use health::state::HealthState;
pub use lifecycle::Shutdown;
pub use load_balancer::{Engine, EngineError, StatsSnapshot, StrategyKind};
