//! Platform Directories
//!
//! Resolves the base directory under which running emulators publish
//! their `avd/running/*.ini` discovery files.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::discovery::DiscoveryError;

/// Subfolder of the user directory used by the emulator tooling
pub const ANDROID_SUBDIR: &str = ".android";

/// Source of the discovery base directory
pub trait PlatformDirs {
    /// Directory that contains `avd/running`
    fn base_dir(&self) -> Result<PathBuf, DiscoveryError>;
}

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl HostOs {
    /// Operating system this binary was built for
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else if cfg!(target_os = "linux") {
            HostOs::Linux
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else {
            HostOs::Other
        }
    }
}

/// Always resolves to the same directory
#[derive(Debug, Clone)]
pub struct FixedDir(pub PathBuf);

impl PlatformDirs for FixedDir {
    fn base_dir(&self) -> Result<PathBuf, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// Resolves the base directory from a snapshot of the host environment
#[derive(Debug, Clone)]
pub struct HostDirs {
    os: HostOs,
    vars: HashMap<String, String>,
    home: Option<PathBuf>,
}

impl HostDirs {
    pub fn new(os: HostOs, vars: HashMap<String, String>, home: Option<PathBuf>) -> Self {
        Self { os, vars, home }
    }

    /// Capture the current process environment
    pub fn from_env() -> Self {
        Self::new(HostOs::current(), std::env::vars().collect(), dirs::home_dir())
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Platform temp/runtime directory, if this OS has one configured
    fn runtime_dir(&self) -> Option<PathBuf> {
        match self.os {
            HostOs::Windows => self.var("LOCALAPPDATA").map(|p| PathBuf::from(p).join("Temp")),
            HostOs::Linux => {
                let xdg = self.var("XDG_RUNTIME_DIR").map(PathBuf::from);
                match xdg {
                    Some(path) if path.exists() => Some(path),
                    _ => Some(PathBuf::from("/run/user").join(current_uid().to_string())),
                }
            }
            HostOs::MacOs => self
                .var("HOME")
                .map(PathBuf::from)
                .or_else(|| self.home.clone())
                .map(|home| home.join("Library").join("Caches").join("TemporaryItems")),
            HostOs::Other => None,
        }
    }

    /// User configuration directory used when no runtime directory exists
    pub fn user_directory(&self) -> Result<PathBuf, DiscoveryError> {
        debug!("Retrieving user directory");

        if let Some(emulator_home) = self.var("ANDROID_EMULATOR_HOME") {
            return Ok(PathBuf::from(emulator_home));
        }

        if let Some(sdk_home) = self.var("ANDROID_SDK_HOME") {
            return Ok(PathBuf::from(sdk_home).join(ANDROID_SUBDIR));
        }

        self.home
            .as_ref()
            .map(|home| home.join(ANDROID_SUBDIR))
            .ok_or(DiscoveryError::NoUserDirectory)
    }
}

impl PlatformDirs for HostDirs {
    fn base_dir(&self) -> Result<PathBuf, DiscoveryError> {
        match self.runtime_dir() {
            Some(path) if path.exists() => Ok(path),
            _ => self.user_directory(),
        }
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}
