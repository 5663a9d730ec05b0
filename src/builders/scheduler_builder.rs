//! Builder wiring a [`Scheduler`] to its store, metrics, and launcher.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{MetricsProvider, ProcessLauncher, Scheduler, SchedulerError, Spawn};
use crate::infra::store::{FileStore, TaskStore};
use crate::runtime::process::LocalProcessRunner;

/// Assembles a scheduler. The store defaults to a [`FileStore`] at
/// `state_path` and the launcher to a [`LocalProcessRunner`]; a metrics
/// provider must always be supplied.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn TaskStore>>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            store: None,
            metrics: None,
            launcher: None,
        }
    }

    /// Use `metrics` for snapshots.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use `store` instead of the file store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `launcher` instead of local processes.
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Build the scheduler without starting its loop.
    pub fn build(self) -> Result<Arc<Scheduler>, SchedulerError> {
        self.config.validate().map_err(SchedulerError::Config)?;
        let metrics = self
            .metrics
            .ok_or_else(|| SchedulerError::Config("a metrics provider is required".into()))?;
        let store: Arc<dyn TaskStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStore::open(&self.config.state_path)?),
        };
        let launcher: Arc<dyn ProcessLauncher> = match self.launcher {
            Some(launcher) => launcher,
            None => Arc::new(LocalProcessRunner::from_config(&self.config)),
        };
        Ok(Arc::new(Scheduler::new(self.config, store, metrics, launcher)?))
    }

    /// Build, then start the loop on `spawner` when `enable_auto_start` is set.
    pub fn build_with<S: Spawn>(self, spawner: &S) -> Result<Arc<Scheduler>, SchedulerError> {
        let auto_start = self.config.enable_auto_start;
        let scheduler = self.build()?;
        if auto_start {
            scheduler.start(spawner);
        }
        Ok(scheduler)
    }
}
