//! Player configuration documents and the file-backed store.
//!
//! Named configurations live as JSON files in a configs directory. Starting
//! an instance snapshots the (port-rewritten) configuration under the
//! instance id, so each spawned player reads exactly the document it was
//! launched with.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Server section: where the player binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Which OpenAI-compatible provider backs the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openrouter,
    Openai,
}

impl Provider {
    /// Base URL of the chat-completions API.
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Openrouter => "https://openrouter.ai/api/v1",
            Provider::Openai => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Openrouter => "OPENROUTER_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }
}

/// AI section: model and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub provider: Provider,
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.8
}

/// How the player plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Aggressive,
    Conservative,
    #[default]
    Balanced,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Aggressive => write!(f, "aggressive"),
            Strategy::Conservative => write!(f, "conservative"),
            Strategy::Balanced => write!(f, "balanced"),
        }
    }
}

/// How the player talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingStyle {
    #[default]
    Casual,
    Formal,
    Witty,
}

impl fmt::Display for SpeakingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakingStyle::Casual => write!(f, "casual"),
            SpeakingStyle::Formal => write!(f, "formal"),
            SpeakingStyle::Witty => write!(f, "witty"),
        }
    }
}

/// Game section: persona settings fed into decision prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub speaking_style: SpeakingStyle,
}

/// Logging section for the spawned player process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_enabled() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enabled: default_log_enabled(),
        }
    }
}

/// A full player configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub server: ServerConfig,
    pub ai: AiConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlayerConfig {
    /// Validate fields serde cannot enforce on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if self.ai.model.trim().is_empty() {
            return Err("ai.model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(format!(
                "ai.temperature {} out of range 0.0-2.0",
                self.ai.temperature
            ));
        }
        Ok(())
    }
}

/// File-backed store of named player configurations.
///
/// Documents are stored as `{name}.json` under the configs directory.
/// Instance snapshots share the directory under the instance id, matching
/// the layout the player process reads at startup.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load and validate a named configuration.
    pub fn load(&self, name: &str) -> Result<PlayerConfig, ConfigError> {
        let path = self.path_for(name);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config: PlayerConfig =
            serde_json::from_str(&data).map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        config.validate().map_err(|message| ConfigError::Invalid {
            name: name.to_string(),
            message,
        })?;

        Ok(config)
    }

    /// Save a named configuration, overwriting any previous document.
    pub fn save(&self, name: &str, config: &PlayerConfig) -> Result<(), ConfigError> {
        let path = self.path_for(name);
        let data = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, data).map_err(|source| ConfigError::Io { path, source })
    }

    /// Delete a named configuration.
    pub fn delete(&self, name: &str) -> Result<(), ConfigError> {
        let path = self.path_for(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
                name: name.to_string(),
            }),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    /// List the names of all stored configurations.
    pub fn list(&self) -> Result<Vec<String>, ConfigError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write the per-instance snapshot used to launch `id`.
    ///
    /// Returns the path the spawned process should read.
    pub fn save_instance(&self, id: &str, config: &PlayerConfig) -> Result<PathBuf, ConfigError> {
        self.save(id, config)?;
        Ok(self.path_for(id))
    }

    /// Remove the per-instance snapshot. Missing files are fine.
    pub fn remove_instance(&self, id: &str) -> Result<(), ConfigError> {
        match self.delete(id) {
            Ok(()) | Err(ConfigError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Load a player configuration straight from a path (player process startup).
pub fn load_from_path(path: &Path) -> Result<PlayerConfig, ConfigError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("player")
        .to_string();
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PlayerConfig = serde_json::from_str(&data).map_err(|e| ConfigError::Invalid {
        name: name.clone(),
        message: e.to_string(),
    })?;
    config
        .validate()
        .map_err(|message| ConfigError::Invalid { name, message })?;
    Ok(config)
}

/// Canonical config used across unit tests.
#[cfg(test)]
pub(crate) fn sample_config(port: u16) -> PlayerConfig {
    PlayerConfig {
        server: ServerConfig {
            port,
            host: "127.0.0.1".to_string(),
        },
        ai: AiConfig {
            model: "anthropic/claude-3-haiku".to_string(),
            max_tokens: 150,
            temperature: 0.8,
            provider: Provider::Openrouter,
        },
        game: GameConfig {
            name: "Pack Alpha".to_string(),
            personality: "quick to accuse".to_string(),
            strategy: Strategy::Aggressive,
            speaking_style: SpeakingStyle::Witty,
        },
        logging: LoggingConfig::default(),
    }
}
