//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself: editors
//! that save by rename replace the inode, which would end a file watch.
//! Only configs that load, validate and differ from the last one sent are
//! forwarded; an empty file is skipped as a save in progress.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::EngineConfig;
use crate::observability::metrics;

/// Watches the engine's config file and sends validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<EngineConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<EngineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Events are handled on notify's own thread; the
    /// returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let reloader = Reloader {
            path: self.path.clone(),
            tx: self.update_tx,
            last: Mutex::new(load_config(&self.path).ok()),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reloader.on_event(&event),
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    tx: mpsc::UnboundedSender<EngineConfig>,
    last: Mutex<Option<EngineConfig>>,
}

impl Reloader {
    fn on_event(&self, event: &Event) {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        let name = self.path.file_name();
        if !event.paths.iter().any(|p| p.file_name() == name) {
            return;
        }
        // truncated by a writer that has not written yet
        if fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(false) {
            return;
        }

        match load_config(&self.path) {
            Ok(config) => {
                let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
                // one save usually fires several events
                if last.as_ref() == Some(&config) {
                    return;
                }
                metrics::record_config_reload(true);
                tracing::info!(path = ?self.path, "Config file changed, reloading");
                *last = Some(config.clone());
                if self.tx.send(config).is_err() {
                    tracing::debug!("Config receiver dropped");
                }
            }
            Err(e) => {
                metrics::record_config_reload(false);
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
