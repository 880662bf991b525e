//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is valid.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub stream: StreamConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

/// Hub and session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Frames buffered per listener before the oldest are dropped
    pub queue_capacity: usize,
    /// Interval between stats pushes to the producer
    pub stats_interval_ms: u64,
    /// WebSocket ping interval towards the producer
    pub heartbeat_secs: u64,
    /// Upper bound on draining background tasks at shutdown
    pub shutdown_timeout_secs: u64,
    /// Text of the acknowledgement's `message` field
    pub ack_message: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stats_interval_ms: DEFAULT_STATS_INTERVAL_MS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            shutdown_timeout_secs: 5,
            ack_message: "Server is receiving audio and relaying it on /listen.mp3".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Listener-facing stream presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub content_type: String,
    /// Sent as `icy-name`
    pub station_name: String,
    /// Sent as `icy-genre`
    pub station_genre: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            content_type: "audio/mpeg".to_string(),
            station_name: "Audio Relay".to_string(),
            station_genre: "Live".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml(&text)?;
                tracing::info!(path = %path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Platform configuration path, e.g. `~/.config/audio-relay/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "audio-relay").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
