//! Typed error hierarchy for the wolfpack orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `OrchestratorError` — instance lifecycle failures surfaced by the facade
//! - `ProbeError` — health-probe failures against a player server
//! - `ConfigError` — configuration store failures

use thiserror::Error;

/// Errors surfaced by the orchestrator facade.
///
/// Every failure of `start`/`stop`/`get` resolves to one of these variants;
/// nothing is thrown past the facade boundary.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Player {id} is already running")]
    AlreadyRunning { id: String },

    #[error("Player {id} not found")]
    NotFound { id: String },

    #[error("No free port within {window} of base port {base}")]
    PortExhausted { base: u16, window: u16 },

    #[error("Failed to start player {id}: {source}")]
    StartupFailed {
        id: String,
        #[source]
        source: StartupError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The underlying cause of a failed launch.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to spawn player process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Server not responding: {0}")]
    Probe(#[source] ProbeError),

    #[error("Player process died during startup")]
    Exited,
}

/// A failed liveness or startup probe. A timed-out probe is treated
/// identically to a failed one, never left pending.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Probe timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Probe request failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("Probe returned status {status}")]
    Status { status: u16 },
}

/// Errors from the configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration '{name}' not found")]
    NotFound { name: String },

    #[error("Configuration '{name}' is invalid: {message}")]
    Invalid { name: String, message: String },

    #[error("Failed to access config at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_carries_id() {
        let err = OrchestratorError::AlreadyRunning {
            id: "p1".to_string(),
        };
        assert!(err.to_string().contains("p1"));
        match err {
            OrchestratorError::AlreadyRunning { id } => assert_eq!(id, "p1"),
            _ => panic!("Expected AlreadyRunning variant"),
        }
    }

    #[test]
    fn startup_failed_chains_spawn_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "wolfpack not found");
        let err = OrchestratorError::StartupFailed {
            id: "p1".to_string(),
            source: StartupError::Spawn(io_err),
        };
        match &err {
            OrchestratorError::StartupFailed { id, source } => {
                assert_eq!(id, "p1");
                assert!(matches!(source, StartupError::Spawn(_)));
            }
            _ => panic!("Expected StartupFailed variant"),
        }
    }

    #[test]
    fn probe_timeout_message_includes_window() {
        let err = ProbeError::Timeout { timeout_secs: 5 };
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn config_error_converts_into_orchestrator_error() {
        let inner = ConfigError::NotFound {
            name: "aggressive".to_string(),
        };
        let err: OrchestratorError = inner.into();
        match err {
            OrchestratorError::Config(ConfigError::NotFound { name }) => {
                assert_eq!(name, "aggressive");
            }
            _ => panic!("Expected Config(NotFound)"),
        }
    }

    #[test]
    fn port_exhausted_is_matchable() {
        let err = OrchestratorError::PortExhausted {
            base: 3001,
            window: 1000,
        };
        assert!(err.to_string().contains("3001"));
    }
}
