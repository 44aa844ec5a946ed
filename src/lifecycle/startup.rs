//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the engine from validated configuration
//! - Start background tasks (metrics exporter, health monitor, config watcher)
//! - Apply reloaded configs until shutdown
//!
//! Startup errors are fatal; reload errors keep the running config.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::EngineConfig;
use crate::health::active::HealthMonitor;
use crate::lifecycle::{signals, Shutdown};
use crate::load_balancer::{Engine, Result};
use crate::observability::metrics;

/// Everything a host keeps alive for the engine's lifetime.
pub struct Services {
    pub engine: Arc<Engine>,
    pub monitor: Arc<HealthMonitor>,
    pub shutdown: Shutdown,
}

impl Services {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let engine = Arc::new(Engine::from_config(config)?);
        let monitor = Arc::new(HealthMonitor::new(
            engine.clone(),
            config.health_check.clone(),
            &config.backends,
        ));
        Ok(Self {
            engine,
            monitor,
            shutdown: Shutdown::new(),
        })
    }

    /// Apply a reloaded config to the engine and the probe targets.
    pub fn apply(&self, config: &EngineConfig) {
        match self.engine.apply_config(config) {
            Ok(summary) if summary.is_noop() => {
                tracing::debug!("Reloaded config has no engine changes");
            }
            Ok(summary) => {
                tracing::info!(
                    added = ?summary.added,
                    removed = ?summary.removed,
                    reweighted = ?summary.reweighted,
                    strategy_changed = summary.strategy_changed,
                    "Config reload applied"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Config reload rejected by engine");
                return;
            }
        }
        self.monitor.update(&config.health_check, &config.backends);
    }
}

/// Run the host until SIGINT/SIGTERM.
pub async fn run(config: EngineConfig, config_path: Option<&Path>) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let services = Services::new(&config)?;

    let monitor_task = tokio::spawn(services.monitor.clone().run(services.shutdown.subscribe()));

    // The watcher must stay alive for events to flow.
    let (_watcher, mut updates) = match config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        None => {
            let (_, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let signal = signals::wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                services.apply(&new_config);
            }
            res = &mut signal => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "Signal handler failed");
                }
                break;
            }
        }
    }

    services.shutdown.trigger();
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }

    let stats = services.engine.snapshot();
    tracing::info!(
        total_connections = stats.total_connections(),
        backends = stats.len(),
        "Engine stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::load_balancer::StrategyKind;

    #[test]
    fn test_services_apply_reload() {
        let services = Services::new(&EngineConfig::placeholder()).unwrap();
        assert_eq!(services.engine.list().len(), 3);
        assert!(services.monitor.targets().is_empty());

        let mut reloaded = EngineConfig::placeholder();
        reloaded.strategy = StrategyKind::Random;
        reloaded.backends.push(BackendConfig::new("ip4", 1).with_address("127.0.0.1:7000"));
        reloaded.health_check.path = "/status".into();
        services.apply(&reloaded);

        assert_eq!(services.engine.list().len(), 4);
        assert_eq!(services.engine.strategy(), StrategyKind::Random);
        assert_eq!(services.monitor.targets().len(), 1);
        assert_eq!(services.monitor.config().path, "/status");
        assert_eq!(
            services.monitor.targets()[0].url.as_str(),
            "http://127.0.0.1:7000/status"
        );
    }
}
