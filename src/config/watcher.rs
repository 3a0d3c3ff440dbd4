//! Properties file watcher for one pool.
//!
//! The pool is single threaded, so the watcher never touches it. It forwards
//! the options under the pool's prefix to the event loop that owns the pool,
//! which applies them with
//! [`TransactionalClient::set_parameters`](crate::pool::TransactionalClient::set_parameters).
//! A reload is forwarded only when those options changed: edits to other
//! sections of a shared file are dropped, and so are reads that catch the
//! file half written.

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_properties;
use crate::config::properties::Properties;
use crate::error::ConfigError;

/// Last applied options of one pool, keyed by their full dotted names.
#[derive(Debug, Clone)]
pub struct ScopedReload {
    prefix: String,
    current: Properties,
}

impl ScopedReload {
    pub fn new(prefix: &str, initial: &Properties) -> Self {
        Self {
            prefix: prefix.to_string(),
            current: initial.scoped(prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Options currently in effect.
    pub fn current(&self) -> &Properties {
        &self.current
    }

    /// Take a freshly loaded file. Returns the pool's options when they
    /// differ from the ones last seen.
    pub fn update(&mut self, props: &Properties) -> Option<Properties> {
        let scoped = props.scoped(&self.prefix);
        if scoped.is_empty() {
            tracing::debug!(prefix = %self.prefix, "No options under prefix, ignoring reload");
            return None;
        }
        if scoped == self.current {
            tracing::trace!(prefix = %self.prefix, "Options unchanged");
            return None;
        }
        self.current = scoped.clone();
        Some(scoped)
    }
}

/// Watches a properties file and sends changed pool options.
pub struct ConfigWatcher {
    path: PathBuf,
    reload: ScopedReload,
    update_tx: mpsc::UnboundedSender<Properties>,
}

impl ConfigWatcher {
    /// Load `path` once and prepare to watch it for the options under
    /// `prefix`. The initial options are available from
    /// [`initial`](Self::initial).
    pub fn new(path: &Path, prefix: &str) -> Result<(Self, mpsc::UnboundedReceiver<Properties>), ConfigError> {
        let props = load_properties(path)?;
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                path: path.to_path_buf(),
                reload: ScopedReload::new(prefix, &props),
                update_tx,
            },
            update_rx,
        ))
    }

    pub fn initial(&self) -> &Properties {
        self.reload.current()
    }

    /// Start watching on the notifier's thread. Updates stop when the
    /// returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut reload,
            update_tx,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                let props = match load_properties(&path) {
                    Ok(props) => props,
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "Reload skipped, keeping current options");
                        return;
                    }
                };
                if let Some(changed) = reload.update(&props) {
                    tracing::info!(path = ?path, prefix = %reload.prefix(), options = changed.len(), "Pool options changed");
                    if update_tx.send(changed).is_err() {
                        tracing::debug!("Reload receiver gone");
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = ?watched, "Watching properties file");
        Ok(watcher)
    }
}
