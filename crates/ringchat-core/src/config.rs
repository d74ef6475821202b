//! Configuration system for RingChat.
//!
//! Resolution order: environment variables → config file → defaults.
//! Command-line flags are applied on top by the daemon.
//!
//! Config file location:
//!   1. $RINGCHAT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ringchat/config.toml
//!   3. ~/.config/ringchat/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{CONTROL_TIMEOUT_SECS, JOIN_TIMEOUT_SECS, RELAY_TIMEOUT_SECS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub network: NetworkConfig,
    pub timeouts: TimeoutConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host other peers dial to reach us. Empty = auto-detect.
    pub advertise_host: String,
    /// TCP port for neighbor links. 0 = pick a free port.
    pub listen_port: u16,
    /// `host:port` of a ring member to join through. Empty = start a new ring.
    pub entry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wait for the entry point's reply during a join.
    pub join_ms: u64,
    /// Control dials and link greetings.
    pub control_ms: u64,
    /// Frame bodies once a header arrived, and every write.
    pub relay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Colorize sender ids in the terminal.
    pub color: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            join_ms: JOIN_TIMEOUT_SECS * 1000,
            control_ms: CONTROL_TIMEOUT_SECS * 1000,
            relay_ms: RELAY_TIMEOUT_SECS * 1000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TimeoutConfig {
    pub fn join(&self) -> Duration {
        Duration::from_millis(self.join_ms)
    }

    pub fn control(&self) -> Duration {
        Duration::from_millis(self.control_ms)
    }

    pub fn relay(&self) -> Duration {
        Duration::from_millis(self.relay_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ringchat")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RingConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, still applying env overrides.
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            RingConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RINGCHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&RingConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply RINGCHAT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RINGCHAT_NETWORK__ADVERTISE_HOST") {
            self.network.advertise_host = v;
        }
        if let Some(p) = lookup("RINGCHAT_NETWORK__LISTEN_PORT").and_then(|v| v.parse().ok()) {
            self.network.listen_port = p;
        }
        if let Some(v) = lookup("RINGCHAT_NETWORK__ENTRY") {
            self.network.entry = v;
        }
        if let Some(ms) = lookup("RINGCHAT_TIMEOUTS__JOIN_MS").and_then(|v| v.parse().ok()) {
            self.timeouts.join_ms = ms;
        }
        if let Some(ms) = lookup("RINGCHAT_TIMEOUTS__CONTROL_MS").and_then(|v| v.parse().ok()) {
            self.timeouts.control_ms = ms;
        }
        if let Some(ms) = lookup("RINGCHAT_TIMEOUTS__RELAY_MS").and_then(|v| v.parse().ok()) {
            self.timeouts.relay_ms = ms;
        }
        if let Some(v) = lookup("RINGCHAT_CHAT__COLOR") {
            self.chat.color = v == "true" || v == "1";
        }
    }
}
