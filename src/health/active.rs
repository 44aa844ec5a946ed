//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends that have an address
//! - Feed results into the engine's per-backend hysteresis
//! - Publish the engine's per-backend gauges once per tick
//!
//! Settings and targets are swapped in place on reload; interval changes
//! take effect after the current tick.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::config::{BackendConfig, HealthCheckConfig};
use crate::load_balancer::{Engine, EngineError, StatsReporter};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Tick period for `config`, never shorter than one second.
pub fn probe_interval(config: &HealthCheckConfig) -> Duration {
    Duration::from_secs(config.interval_secs).max(MIN_INTERVAL)
}

/// A backend id paired with the URL probed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub id: String,
    pub url: Url,
}

/// Build probe targets for every backend with an address.
pub fn probe_targets(backends: &[BackendConfig], path: &str) -> Vec<ProbeTarget> {
    backends
        .iter()
        .filter_map(|b| {
            let address = b.address.as_ref()?;
            match Url::parse(&format!("http://{}{}", address, path)) {
                Ok(url) => Some(ProbeTarget {
                    id: b.id.clone(),
                    url,
                }),
                Err(e) => {
                    tracing::warn!(backend = %b.id, address = %address, error = %e, "Skipping probe target");
                    None
                }
            }
        })
        .collect()
}

pub struct HealthMonitor {
    engine: Arc<Engine>,
    config: ArcSwap<HealthCheckConfig>,
    targets: ArcSwap<Vec<ProbeTarget>>,
    client: reqwest::Client,
}

impl HealthMonitor {
    pub fn new(engine: Arc<Engine>, config: HealthCheckConfig, backends: &[BackendConfig]) -> Self {
        let targets = probe_targets(backends, &config.path);
        // probes go straight to the backend, never through an env proxy
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for probes");
                reqwest::Client::new()
            });
        Self {
            engine,
            config: ArcSwap::from_pointee(config),
            targets: ArcSwap::from_pointee(targets),
            client,
        }
    }

    /// Replace the probe targets after a config reload.
    pub fn update_targets(&self, backends: &[BackendConfig]) {
        let targets = probe_targets(backends, &self.config.load().path);
        tracing::info!(targets = targets.len(), "Health probe targets updated");
        self.targets.store(Arc::new(targets));
    }

    /// Swap in reloaded health check settings and rebuild the targets.
    pub fn update(&self, config: &HealthCheckConfig, backends: &[BackendConfig]) {
        if **self.config.load() != *config {
            tracing::info!(
                enabled = config.enabled,
                interval = config.interval_secs,
                path = %config.path,
                "Health check settings updated"
            );
            self.config.store(Arc::new(config.clone()));
        }
        self.update_targets(backends);
    }

    pub fn config(&self) -> Arc<HealthCheckConfig> {
        self.config.load_full()
    }

    pub fn targets(&self) -> Arc<Vec<ProbeTarget>> {
        self.targets.load_full()
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let config = self.config.load_full();
        if config.interval_secs == 0 {
            tracing::warn!(minimum = ?MIN_INTERVAL, "Health check interval is zero, using minimum");
        }
        tracing::info!(
            enabled = config.enabled,
            interval = config.interval_secs,
            path = %config.path,
            "Health monitor starting"
        );

        let mut period = probe_interval(&config);
        let mut ticker = time::interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let enabled = self.config.load().enabled;
                    if enabled {
                        self.check_all().await;
                    }
                    StatsReporter::publish(&self.engine.snapshot());

                    let next = probe_interval(&self.config.load());
                    if next != period {
                        period = next;
                        ticker = time::interval_at(time::Instant::now() + period, period);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every target once.
    pub async fn check_all(&self) {
        let thresholds = self.config.load().thresholds();

        let targets = self.targets.load_full();

        for target in targets.iter() {
            let healthy = self.probe(target).await;

            match self.engine.report_probe(&target.id, healthy, thresholds) {
                Ok(_) => {}
                Err(EngineError::BackendNotFound(_)) => {
                    tracing::debug!(backend = %target.id, "Probed backend no longer registered");
                }
                Err(e) => {
                    tracing::error!(backend = %target.id, error = %e, "Failed to record probe result");
                }
            }
        }
    }

    async fn probe(&self, target: &ProbeTarget) -> bool {
        let timeout = Duration::from_secs(self.config.load().timeout_secs);
        let request = self
            .client
            .get(target.url.clone())
            .header("user-agent", "backend-balancer-health-check")
            .send();

        match time::timeout(timeout, request).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(backend = %target.id, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %target.id, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %target.id, "Health check failed: timeout");
                false
            }
        }
    }
}
