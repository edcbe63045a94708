//! Process supervision for spawned player servers.
//!
//! The supervisor owns the messy edges of the lifecycle: spawning the child
//! process, watching for its exit, and probing its status endpoint. After a
//! spawn it waits a fixed settle delay before the first probe so the server
//! has a chance to bind. Probes carry their own bounded timeout; a timed-out
//! probe counts as a failed one.
//!
//! Termination is fire-and-forget: `ProcessHandle::terminate` sends SIGTERM
//! and returns without waiting for the process to die. The exit watcher task
//! keeps ownership of the child, so a late exit is still reaped and recorded.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{ProbeError, StartupError};
use crate::orchestrator::registry::InstanceRegistry;

/// Settle delay between spawn and the first probe.
const SETTLE_DELAY_SECS: u64 = 2;

/// Timeout for the startup probe.
const STARTUP_PROBE_SECS: u64 = 5;

/// Timeout for later liveness probes.
const LIVENESS_PROBE_SECS: u64 = 3;

/// Opaque reference to a spawned OS process.
///
/// Used only for termination signaling; never serialized or exposed
/// across the API boundary.
#[derive(Debug, Clone, Copy)]
pub struct ProcessHandle {
    pid: Option<u32>,
}

impl ProcessHandle {
    pub fn new(pid: u32) -> Self {
        Self { pid: Some(pid) }
    }

    /// Handle for a child whose pid was unavailable at spawn time.
    pub fn unknown() -> Self {
        Self { pid: None }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Send a graceful termination signal. Best-effort: the process may
    /// ignore it, and the caller does not wait for it to exit.
    pub fn terminate(&self) -> std::io::Result<()> {
        let Some(pid) = self.pid.filter(|p| *p > 0) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no pid recorded for process",
            ));
        };

        #[cfg(unix)]
        {
            // Signal 15 asks the player to shut down; the exit watcher
            // records the eventual exit.
            if unsafe { libc::kill(pid as i32, libc::SIGTERM) } == 0 {
                Ok(())
            } else {
                Err(std::io::Error::last_os_error())
            }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "process signaling is only supported on unix",
            ))
        }
    }
}

/// The command used to launch a player server.
///
/// Defaults to re-invoking the current executable with the `player`
/// subcommand; overridable for deployments that run players from a
/// different binary.
#[derive(Debug, Clone)]
pub struct PlayerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl PlayerCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `{current_exe} player`.
    pub fn current_exe() -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("wolfpack"));
        Self {
            program,
            args: vec!["player".to_string()],
        }
    }
}

impl Default for PlayerCommand {
    fn default() -> Self {
        Self::current_exe()
    }
}

/// Seam between the orchestrator facade and real process management.
#[async_trait]
pub trait Supervise: Send + Sync {
    /// Spawn the player process for `id` bound to `port`, wiring an exit
    /// watcher into `registry`.
    async fn spawn(
        &self,
        id: &str,
        config_path: &Path,
        port: u16,
        registry: Arc<InstanceRegistry>,
    ) -> Result<ProcessHandle, StartupError>;

    /// Wait out the settle delay, then run the startup probe.
    async fn wait_until_ready(&self, port: u16) -> Result<(), ProbeError>;

    /// Run a liveness probe against an instance presumed running.
    async fn check_liveness(&self, port: u16) -> Result<(), ProbeError>;
}

/// Real supervisor backed by `tokio::process` and HTTP probes.
pub struct ProcessSupervisor {
    command: PlayerCommand,
    client: reqwest::Client,
    settle_delay: Duration,
    startup_timeout: Duration,
    liveness_timeout: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(PlayerCommand::default())
    }
}

impl ProcessSupervisor {
    pub fn new(command: PlayerCommand) -> Self {
        Self {
            command,
            client: reqwest::Client::new(),
            settle_delay: Duration::from_secs(SETTLE_DELAY_SECS),
            startup_timeout: Duration::from_secs(STARTUP_PROBE_SECS),
            liveness_timeout: Duration::from_secs(LIVENESS_PROBE_SECS),
        }
    }

    /// Shrink the settle delay (used by tests).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    async fn probe(&self, port: u16, timeout: Duration) -> Result<(), ProbeError> {
        let url = format!("http://127.0.0.1:{port}/api/player/status");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout {
                        timeout_secs: timeout.as_secs(),
                    }
                } else {
                    ProbeError::Connect(e)
                }
            })?;

        let status = response.status();
        // Any non-error response counts as live.
        if status.is_client_error() || status.is_server_error() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }
        debug!(port, %status, "probe ok");
        Ok(())
    }
}

#[async_trait]
impl Supervise for ProcessSupervisor {
    async fn spawn(
        &self,
        id: &str,
        config_path: &Path,
        port: u16,
        registry: Arc<InstanceRegistry>,
    ) -> Result<ProcessHandle, StartupError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg("--config")
            .arg(config_path)
            .arg("--port")
            .arg(port.to_string());

        // stderr is inherited so player startup errors stay visible in the
        // manager's terminal; stdout would only interleave with our logs.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(StartupError::Spawn)?;
        let handle = child
            .id()
            .map(ProcessHandle::new)
            .unwrap_or_else(ProcessHandle::unknown);

        info!(id, port, pid = ?handle.pid(), "spawned player process");

        // The watcher owns the child. It reaps the exit whenever it comes
        // and records the transition; exits for removed records are dropped.
        let id = id.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    info!(id, code = ?status.code(), "player process exited");
                    registry.record_exit(&id, true).await;
                }
                Err(e) => {
                    warn!(id, error = %e, "failed waiting on player process");
                    registry.record_exit(&id, false).await;
                }
            }
        });

        Ok(handle)
    }

    async fn wait_until_ready(&self, port: u16) -> Result<(), ProbeError> {
        tokio::time::sleep(self.settle_delay).await;
        self.probe(port, self.startup_timeout).await
    }

    async fn check_liveness(&self, port: u16) -> Result<(), ProbeError> {
        self.probe(port, self.liveness_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_config;
    use crate::orchestrator::registry::{InstanceRecord, InstanceStatus};
    use axum::{Router, routing::post};

    fn test_supervisor(command: PlayerCommand) -> ProcessSupervisor {
        ProcessSupervisor::new(command).with_settle_delay(Duration::from_millis(10))
    }

    /// Bind a throwaway status endpoint and return its port.
    async fn serve_status(status: axum::http::StatusCode) -> u16 {
        let app = Router::new().route(
            "/api/player/status",
            post(move || async move { (status, "{}") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn probe_succeeds_against_live_endpoint() {
        let port = serve_status(axum::http::StatusCode::OK).await;
        let supervisor = test_supervisor(PlayerCommand::default());
        supervisor.check_liveness(port).await.unwrap();
        supervisor.wait_until_ready(port).await.unwrap();
    }

    #[tokio::test]
    async fn probe_fails_on_error_status() {
        let port = serve_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let supervisor = test_supervisor(PlayerCommand::default());
        match supervisor.check_liveness(port).await {
            Err(ProbeError::Status { status }) => assert_eq!(status, 500),
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_fails_when_nothing_listens() {
        // Bind then drop a listener to find a port with no server.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let supervisor = test_supervisor(PlayerCommand::default());
        assert!(matches!(
            supervisor.check_liveness(port).await,
            Err(ProbeError::Connect(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_error_for_missing_program() {
        let registry = Arc::new(InstanceRegistry::new());
        let supervisor =
            test_supervisor(PlayerCommand::new("/nonexistent/wolfpack-player", vec![]));
        let result = supervisor
            .spawn("p1", Path::new("/tmp/p1.json"), 3001, registry)
            .await;
        assert!(matches!(result, Err(StartupError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_watcher_stops_running_record() {
        let registry = Arc::new(InstanceRegistry::new());
        registry
            .insert(InstanceRecord::starting("p1", 3001, sample_config(3001)))
            .await;
        registry.mark_running("p1").await.unwrap();

        // `true` ignores the config/port arguments and exits immediately.
        let supervisor = test_supervisor(PlayerCommand::new("true", vec![]));
        let handle = supervisor
            .spawn("p1", Path::new("/tmp/p1.json"), 3001, registry.clone())
            .await
            .unwrap();
        assert!(handle.pid().is_some());

        // Give the watcher a moment to reap the exit.
        for _ in 0..50 {
            if registry.get("p1").await.unwrap().status == InstanceStatus::Stopped {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("exit watcher never recorded the stop");
    }

    #[test]
    fn terminate_without_pid_is_an_error() {
        let handle = ProcessHandle::unknown();
        assert!(handle.terminate().is_err());
    }
}
