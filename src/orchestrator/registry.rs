//! In-memory instance registry: the single source of truth for what is
//! running.
//!
//! All mutation goes through named transition methods so the state machine
//! stays closed: `Starting → Running | Error`, `Running → Stopped | Error`,
//! `Stopped`/`Error` terminal until an explicit stop or restart. The
//! registry also hands out per-id locks that the facade holds across a
//! whole start or stop, serializing operations on the same id while
//! distinct ids proceed concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::config::PlayerConfig;
use crate::errors::OrchestratorError;
use crate::orchestrator::ports;
use crate::orchestrator::supervisor::ProcessHandle;

/// Lifecycle state of a player instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopped,
    Error,
}

/// Bookkeeping record for one running (or previously run) player.
///
/// The process handle never crosses the serialization boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: String,
    /// Port actually bound, which may differ from the configuration's
    /// requested port after collision resolution.
    pub port: u16,
    /// Snapshot of the configuration used to launch this instance.
    pub config: PlayerConfig,
    pub status: InstanceStatus,
    #[serde(skip)]
    pub handle: Option<ProcessHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl InstanceRecord {
    /// A fresh record in the `Starting` state.
    pub fn starting(id: &str, port: u16, config: PlayerConfig) -> Self {
        Self {
            id: id.to_string(),
            port,
            config,
            status: InstanceStatus::Starting,
            handle: None,
            start_time: None,
        }
    }
}

/// Thread-safe registry of instance records keyed by id.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<String, InstanceRecord>>,
    // Lock table entries are retained for the registry's lifetime; ids are
    // few and get reused across restarts.
    id_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the per-id lock. The facade holds the guard for the full
    /// duration of a start or stop so the two cannot interleave on one id.
    pub async fn lock_id(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.id_locks.lock().await;
            locks.entry(id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn insert(&self, record: InstanceRecord) {
        let mut instances = self.instances.write().await;
        instances.insert(record.id.clone(), record);
    }

    /// Allocate a port and insert the `Starting` record in one step, under
    /// a single write lock. Reading the in-use set and inserting must not
    /// interleave with another reservation, or two starts on distinct ids
    /// could both pick the same free port.
    ///
    /// The configuration's requested port is the allocation base and is
    /// rewritten to the allocated port in the stored record.
    pub async fn reserve(
        &self,
        id: &str,
        mut config: PlayerConfig,
    ) -> Result<InstanceRecord, OrchestratorError> {
        let mut instances = self.instances.write().await;
        let in_use: HashSet<u16> = instances
            .values()
            .filter(|r| {
                matches!(
                    r.status,
                    InstanceStatus::Running | InstanceStatus::Starting
                )
            })
            .map(|r| r.port)
            .collect();

        let port = ports::allocate(config.server.port, &in_use)?;
        config.server.port = port;

        let record = InstanceRecord::starting(id, port, config);
        instances.insert(id.to_string(), record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<InstanceRecord> {
        self.instances.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<InstanceRecord> {
        self.instances.write().await.remove(id)
    }

    pub async fn list(&self) -> Vec<InstanceRecord> {
        let mut records: Vec<_> = self.instances.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub async fn ids(&self) -> Vec<String> {
        self.instances.read().await.keys().cloned().collect()
    }

    /// Ports held by records that are live or still coming up. `Starting`
    /// records count so two interleaved starts never pick the same port.
    pub async fn ports_in_use(&self) -> HashSet<u16> {
        self.instances
            .read()
            .await
            .values()
            .filter(|r| {
                matches!(
                    r.status,
                    InstanceStatus::Running | InstanceStatus::Starting
                )
            })
            .map(|r| r.port)
            .collect()
    }

    /// Attach the process handle to a `Starting` record after spawn.
    pub async fn attach_handle(&self, id: &str, handle: ProcessHandle) {
        let mut instances = self.instances.write().await;
        if let Some(record) = instances.get_mut(id) {
            record.handle = Some(handle);
        }
    }

    /// `Starting → Running`, stamping the launch time. Returns the updated
    /// record, or `None` if the record is absent or no longer `Starting`.
    pub async fn mark_running(&self, id: &str) -> Option<InstanceRecord> {
        let mut instances = self.instances.write().await;
        let record = instances.get_mut(id)?;
        if record.status != InstanceStatus::Starting {
            return None;
        }
        record.status = InstanceStatus::Running;
        record.start_time = Some(Utc::now());
        Some(record.clone())
    }

    /// `Starting | Running → Error`. Terminal states are left untouched.
    /// Returns whether the transition applied.
    pub async fn mark_error(&self, id: &str) -> bool {
        let mut instances = self.instances.write().await;
        match instances.get_mut(id) {
            Some(record)
                if matches!(
                    record.status,
                    InstanceStatus::Starting | InstanceStatus::Running
                ) =>
            {
                record.status = InstanceStatus::Error;
                true
            }
            _ => false,
        }
    }

    /// Apply an asynchronous process-exit notification.
    ///
    /// A clean exit moves `Running → Stopped`; an exit carrying an OS error
    /// moves `Starting | Running → Error`. A clean exit while still
    /// `Starting` is left for the startup probe to resolve, and exits for
    /// removed or terminal records are dropped.
    pub async fn record_exit(&self, id: &str, clean: bool) -> bool {
        let mut instances = self.instances.write().await;
        let Some(record) = instances.get_mut(id) else {
            return false;
        };
        match (record.status, clean) {
            (InstanceStatus::Running, true) => {
                record.status = InstanceStatus::Stopped;
                true
            }
            (InstanceStatus::Running, false) | (InstanceStatus::Starting, false) => {
                record.status = InstanceStatus::Error;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_config;
    use std::time::Duration;

    fn record(id: &str, port: u16) -> InstanceRecord {
        InstanceRecord::starting(id, port, sample_config(port))
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;

        let found = registry.get("p1").await.unwrap();
        assert_eq!(found.port, 3001);
        assert_eq!(found.status, InstanceStatus::Starting);

        assert!(registry.remove("p1").await.is_some());
        assert!(registry.get("p1").await.is_none());
    }

    #[tokio::test]
    async fn ports_in_use_counts_starting_and_running() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;
        registry.insert(record("p2", 3002)).await;
        registry.mark_running("p2").await.unwrap();

        let mut stopped = record("p3", 3003);
        stopped.status = InstanceStatus::Stopped;
        registry.insert(stopped).await;

        let in_use = registry.ports_in_use().await;
        assert!(in_use.contains(&3001));
        assert!(in_use.contains(&3002));
        assert!(!in_use.contains(&3003));
    }

    #[tokio::test]
    async fn reserve_allocates_and_inserts_together() {
        let registry = InstanceRegistry::new();

        let first = registry.reserve("p1", sample_config(3001)).await.unwrap();
        let second = registry.reserve("p2", sample_config(3001)).await.unwrap();

        assert_eq!(first.port, 3001);
        assert_eq!(second.port, 3002);
        assert_eq!(second.config.server.port, 3002);
        assert_eq!(
            registry.get("p2").await.unwrap().status,
            InstanceStatus::Starting
        );
    }

    #[tokio::test]
    async fn mark_running_requires_starting() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;

        let updated = registry.mark_running("p1").await.unwrap();
        assert_eq!(updated.status, InstanceStatus::Running);
        assert!(updated.start_time.is_some());

        // Already running: no second transition.
        assert!(registry.mark_running("p1").await.is_none());
    }

    #[tokio::test]
    async fn clean_exit_stops_running_record() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;
        registry.mark_running("p1").await.unwrap();

        assert!(registry.record_exit("p1", true).await);
        assert_eq!(
            registry.get("p1").await.unwrap().status,
            InstanceStatus::Stopped
        );
    }

    #[tokio::test]
    async fn stopped_and_error_are_terminal() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;
        registry.mark_running("p1").await.unwrap();
        registry.record_exit("p1", true).await;

        // No automatic transition out of Stopped.
        assert!(!registry.record_exit("p1", false).await);
        assert!(!registry.mark_error("p1").await);
        assert_eq!(
            registry.get("p1").await.unwrap().status,
            InstanceStatus::Stopped
        );
    }

    #[tokio::test]
    async fn clean_exit_while_starting_is_deferred_to_probe() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;

        assert!(!registry.record_exit("p1", true).await);
        assert_eq!(
            registry.get("p1").await.unwrap().status,
            InstanceStatus::Starting
        );
    }

    #[tokio::test]
    async fn exit_for_removed_record_is_dropped() {
        let registry = InstanceRegistry::new();
        assert!(!registry.record_exit("ghost", true).await);
    }

    #[tokio::test]
    async fn serialized_record_omits_handle() {
        let registry = InstanceRegistry::new();
        registry.insert(record("p1", 3001)).await;
        registry.attach_handle("p1", ProcessHandle::new(4242)).await;
        registry.mark_running("p1").await.unwrap();

        let value = serde_json::to_value(registry.get("p1").await.unwrap()).unwrap();
        assert!(value.get("handle").is_none());
        assert!(value.get("pid").is_none());
        assert_eq!(value["status"], "running");
        assert!(value.get("startTime").is_some());
    }

    #[tokio::test]
    async fn per_id_lock_serializes_same_id() {
        let registry = Arc::new(InstanceRegistry::new());

        let guard = registry.lock_id("p1").await;

        let contender = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let _guard = registry.lock_id("p1").await;
            })
        };

        // The contender cannot finish while we hold the guard.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different id is not blocked.
        let _other = registry.lock_id("p2").await;

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }
}
