//! Client-side configuration loading
//!
//! Reads `client.toml` from the chatstack config directory. Every field has a
//! default, so a missing file or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chatstack_utils::{client_config_file, ChatstackError, Result};

use crate::connection::{ReconnectPolicy, DEFAULT_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS};
use crate::fallback::DEFAULT_FALLBACK_DELAY_MS;

/// Default relay base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay base URL; the WebSocket endpoint is derived from it
    pub server_url: String,
    pub reconnect: ReconnectConfig,
    pub fallback: FallbackConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_attempts, Duration::from_millis(self.interval_ms))
    }
}

/// Mock fallback timer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub delay_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: DEFAULT_FALLBACK_DELAY_MS,
        }
    }
}

impl FallbackConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl ClientConfig {
    /// Load configuration
    ///
    /// An explicitly given path must exist and parse. The default path falls
    /// back to defaults when the file is absent or unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let path = client_config_file();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        match Self::load_from(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load and parse a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ChatstackError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path.to_path_buf())
    }

    fn parse(content: &str, path: PathBuf) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ChatstackError::ConfigInvalid {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: PathBuf) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(ChatstackError::ConfigInvalid {
                path,
                message: "server_url must not be empty".into(),
            });
        }
        Ok(())
    }
}
