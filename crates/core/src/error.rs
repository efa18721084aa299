//! Error types for emu-channel
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for emu-channel configuration
#[derive(Error, Debug)]
pub enum EmuChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for emu-channel operations
pub type Result<T> = std::result::Result<T, EmuChannelError>;

impl EmuChannelError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            EmuChannelError::Io(e) => format!("File operation failed: {}", e),
            EmuChannelError::Config(msg) => format!("Configuration error: {}", msg),
            EmuChannelError::TomlParse { path, .. } => {
                format!("Config file {} is not valid TOML", path.display())
            }
            _ => self.to_string(),
        }
    }
}
