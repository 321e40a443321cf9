use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinError;

use crate::config::{ConfigError, RegistryConfig};
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::{Cancellation, PluginRegistry};

type InstallResult = Result<Arc<PluginDescriptor>, PluginSystemError>;

/// Async front end to a shared [`PluginRegistry`].
///
/// Archive I/O is blocking, so every install runs on tokio's blocking pool.
/// With a timeout set, an install that takes too long is reported as
/// [`PluginSystemError::TimedOut`] and is guaranteed not to be admitted
/// afterwards.
#[derive(Clone)]
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    timeout: Option<Duration>,
}

impl PluginManager {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry, timeout: None }
    }

    /// Build a registry and manager from configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(PluginRegistry::from_config(config)?);
        Ok(Self {
            registry,
            timeout: config.install_timeout(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get reference to the shared registry
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Install one plugin archive.
    pub async fn install(&self, path: impl Into<PathBuf>) -> InstallResult {
        let path = path.into();
        let cancel = Arc::new(Cancellation::new());

        let registry = Arc::clone(&self.registry);
        let worker_cancel = Arc::clone(&cancel);
        let worker_path = path.clone();
        let mut handle =
            tokio::task::spawn_blocking(move || registry.add_plugin_cancellable(&worker_path, &worker_cancel));

        let Some(limit) = self.timeout else {
            return flatten(handle.await, &path);
        };

        match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => flatten(joined, &path),
            Err(_) => {
                if cancel.try_cancel() {
                    warn!("Install of {} timed out after {:?}", path.display(), limit);
                    Err(PluginSystemError::TimedOut { path, timeout: limit })
                } else {
                    // The worker committed first; its outcome stands.
                    debug!("Install of {} committed before the timeout fired", path.display());
                    flatten(handle.await, &path)
                }
            }
        }
    }

    /// Install archives one after another, in the given order.
    ///
    /// Later archives may depend on earlier ones. A failure does not stop
    /// the remaining installs.
    pub async fn install_in_order<I, P>(&self, paths: I) -> Vec<(PathBuf, InstallResult)>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut results = Vec::new();
        for path in paths {
            let path = path.into();
            let result = self.install(path.clone()).await;
            results.push((path, result));
        }
        results
    }

    /// Install archives concurrently. Results are returned in input order.
    pub async fn install_all<I, P>(&self, paths: I) -> Vec<(PathBuf, InstallResult)>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let tasks: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let path = path.into();
                let manager = self.clone();
                let task_path = path.clone();
                (path, tokio::spawn(async move { manager.install(task_path).await }))
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (path, task) in tasks {
            let result = flatten(task.await, &path);
            results.push((path, result));
        }
        results
    }
}

fn flatten(joined: Result<InstallResult, JoinError>, path: &std::path::Path) -> InstallResult {
    joined.unwrap_or_else(|e| {
        Err(PluginSystemError::WorkerFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

impl Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.registry.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
