//! Application Configuration
//!
//! Settings that shape discovery and channel construction:
//! - Discovery base directory override
//! - Host and connect timeout for emulator channels

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{EmuChannelError, Result};

/// Discovery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory containing `avd/running`, bypassing platform resolution
    pub base_dir: Option<PathBuf>,
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    /// Host the emulator gRPC ports are reached on
    pub host: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            connect_timeout_ms: None,
        }
    }
}

impl ChannelConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version for migrations
    pub version: u32,
    /// Discovery settings
    pub discovery: DiscoveryConfig,
    /// Channel settings
    pub channel: ChannelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            discovery: DiscoveryConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "emu-channel", "emu-channel")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| EmuChannelError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file)
    }

    /// Load configuration from `path`, using defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, using defaults");
            return Ok(AppConfig::default());
        }

        debug!("Loading config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|source| EmuChannelError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }
}
