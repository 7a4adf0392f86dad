//! Hot reload of the configuration file
//!
//! The parent directory is watched rather than the file: editors that save by
//! renaming a temporary file over the original would otherwise detach the
//! watch. A burst of events collapses into a single reload.

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::AppConfig;

/// Quiet time after the last event before the file is read again
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Yields every new valid configuration written to the watched file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, AppConfig)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let path = PathBuf::from(&config_path);
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| anyhow!("'{}' does not name a file", config_path))?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel(4);
        let generation = Arc::new(AtomicU64::new(0));
        // notify calls back on its own thread, outside the runtime
        let runtime = tokio::runtime::Handle::current();
        let reload_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };
            if !touches(&event, &file_name) {
                return;
            }
            trace!("Config event {:?}", event.kind);

            let ticket = generation.fetch_add(1, Ordering::SeqCst) + 1;
            let generation = Arc::clone(&generation);
            let path = reload_path.clone();
            let tx = tx.clone();

            runtime.spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;
                // A later event owns the reload
                if generation.load(Ordering::SeqCst) == ticket {
                    reload(&path, &tx).await;
                }
            });
        })?;

        watcher
            .watch(Path::new(&dir), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        info!("Watching {} for changes", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Next valid configuration; `None` once the watcher is gone
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

/// Whether `event` writes or replaces the watched file
fn touches(event: &Event, file_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

async fn reload(path: &str, tx: &mpsc::Sender<AppConfig>) {
    match AppConfig::load(path).await {
        Ok(config) => {
            info!("Configuration reloaded from {}", path);
            if tx.send(config).await.is_err() {
                debug!("Nobody listens for config updates anymore");
            }
        }
        Err(e) => warn!("Keeping previous configuration: {:#}", e),
    }
}
