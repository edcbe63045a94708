//! The orchestrator facade: start/stop/query/list of player instances.
//!
//! `PlayerManager` is the sole entry point the HTTP layer talks to, and the
//! only owner of the instance registry. It is constructed explicitly by the
//! process entry point and torn down with `shutdown()`; there is no global
//! instance.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::ConfigStore;
use crate::errors::{OrchestratorError, StartupError};
use crate::orchestrator::registry::{InstanceRecord, InstanceRegistry, InstanceStatus};
use crate::orchestrator::supervisor::Supervise;

pub struct PlayerManager {
    registry: Arc<InstanceRegistry>,
    store: ConfigStore,
    supervisor: Arc<dyn Supervise>,
}

impl PlayerManager {
    pub fn new(store: ConfigStore, supervisor: Arc<dyn Supervise>) -> Self {
        Self {
            registry: Arc::new(InstanceRegistry::new()),
            store,
            supervisor,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Launch a player instance from the named configuration.
    ///
    /// Holds the per-id lock for the whole call: a concurrent start or stop
    /// for the same id waits until this one resolves to `Running` or
    /// `Error`. On failure the record is kept with `status = error` so the
    /// launch failure stays observable until an explicit stop.
    pub async fn start(
        &self,
        id: &str,
        config_name: &str,
    ) -> Result<InstanceRecord, OrchestratorError> {
        let _guard = self.registry.lock_id(id).await;

        if let Some(existing) = self.registry.get(id).await {
            if existing.status == InstanceStatus::Running {
                return Err(OrchestratorError::AlreadyRunning { id: id.to_string() });
            }
            // Stale stopped/errored record: the new start replaces it.
        }

        let config = self.store.load(config_name)?;

        // Port allocation and the Starting record land atomically, so a
        // concurrent start on a different id sees this port as taken.
        let record = self.registry.reserve(id, config).await?;
        let port = record.port;

        let config_path = match self.store.save_instance(id, &record.config) {
            Ok(path) => path,
            Err(e) => {
                self.registry.remove(id).await;
                return Err(e.into());
            }
        };

        match self
            .supervisor
            .spawn(id, &config_path, port, self.registry.clone())
            .await
        {
            Ok(handle) => self.registry.attach_handle(id, handle).await,
            Err(source) => {
                self.registry.mark_error(id).await;
                return Err(OrchestratorError::StartupFailed {
                    id: id.to_string(),
                    source,
                });
            }
        }

        if let Err(probe) = self.supervisor.wait_until_ready(port).await {
            self.registry.mark_error(id).await;
            return Err(OrchestratorError::StartupFailed {
                id: id.to_string(),
                source: StartupError::Probe(probe),
            });
        }

        match self.registry.mark_running(id).await {
            Some(record) => {
                info!(id, port, "player instance running");
                Ok(record)
            }
            // The exit watcher beat us to a terminal state.
            None => Err(OrchestratorError::StartupFailed {
                id: id.to_string(),
                source: StartupError::Exited,
            }),
        }
    }

    /// Stop an instance: signal the process (best-effort) and drop the
    /// record unconditionally.
    pub async fn stop(&self, id: &str) -> Result<(), OrchestratorError> {
        let _guard = self.registry.lock_id(id).await;

        let record = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound { id: id.to_string() })?;

        if let Some(handle) = record.handle {
            if let Err(e) = handle.terminate() {
                warn!(id, error = %e, "failed to signal player process");
            }
        }

        self.registry.remove(id).await;

        if let Err(e) = self.store.remove_instance(id) {
            warn!(id, error = %e, "failed to clean up instance config");
        }

        info!(id, "player instance stopped");
        Ok(())
    }

    /// Fetch an instance record, re-validating liveness first when the
    /// cached status is `Running`. A failed liveness probe demotes the
    /// record to `Error` without killing the process.
    pub async fn get(&self, id: &str) -> Result<InstanceRecord, OrchestratorError> {
        let record = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound { id: id.to_string() })?;

        if record.status == InstanceStatus::Running {
            if let Err(e) = self.supervisor.check_liveness(record.port).await {
                warn!(id, error = %e, "liveness probe failed");
                self.registry.mark_error(id).await;
            }
        }

        self.registry
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound { id: id.to_string() })
    }

    /// Cheap, eventually-consistent snapshot of the registry. No probing.
    pub async fn list(&self) -> Vec<InstanceRecord> {
        self.registry.list().await
    }

    /// Stop every registered instance. Individual failures are logged and
    /// never abort the sweep.
    pub async fn stop_all(&self) {
        let ids = self.registry.ids().await;
        let results = join_all(ids.iter().map(|id| self.stop(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                warn!(id, error = %e, "failed to stop player instance");
            }
        }
    }

    /// Explicit teardown, called by the entry point on shutdown.
    pub async fn shutdown(&self) {
        info!("shutting down all player instances");
        self.stop_all().await;
    }
}
