//! Configuration types for the chat pipeline.

use crate::avatar::directive::DirectivePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EleonorConfig {
    /// Chat stream endpoint settings.
    pub chat: ChatConfig,
    /// Audio playback settings.
    pub audio: AudioConfig,
    /// Avatar expression control settings.
    pub avatar: AvatarConfig,
}

/// Chat stream endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// URL accepting `{ "text": ... }` and answering with a framed event stream.
    pub endpoint: String,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/api/chat/stream".to_owned(),
            connect_timeout_secs: 10,
        }
    }
}

impl ChatConfig {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Audio playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Whether audio clips from the stream are played at all.
    pub enabled: bool,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_device: None,
        }
    }
}

/// Avatar control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Whether expression directives trigger the control client.
    pub enabled: bool,
    /// WebSocket URL of the local control server.
    pub url: String,
    /// Plugin name presented during authentication.
    pub plugin_name: String,
    /// Plugin developer presented during authentication.
    pub plugin_developer: String,
    /// Token file path (None = `eleonor_dirs::token_file()`).
    pub token_file: Option<PathBuf>,
    /// How long an expression stays active before it is deactivated, in ms.
    pub dwell_ms: u64,
    /// How long to wait for a correlated response, in ms.
    pub response_timeout_ms: u64,
    /// Which directive is acted upon when a reply carries several.
    pub directive_policy: DirectivePolicy,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://localhost:8001".to_owned(),
            plugin_name: "EleonorAI".to_owned(),
            plugin_developer: "JosueHF".to_owned(),
            token_file: None,
            dwell_ms: 4000,
            response_timeout_ms: 5000,
            directive_policy: DirectivePolicy::default(),
        }
    }
}

impl AvatarConfig {
    /// Dwell duration as a [`Duration`].
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    /// Response timeout as a [`Duration`].
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Resolved token file path.
    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .unwrap_or_else(crate::eleonor_dirs::token_file)
    }
}

impl EleonorConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChatError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::eleonor_dirs::config_file()
    }
}
