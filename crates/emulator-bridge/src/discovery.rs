//! Emulator Discovery
//!
//! Every running emulator writes a descriptor into `<base>/avd/running`.
//! The files carry an `.ini` extension but are flat `key=value` lines with
//! no sections, quoting or comments.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::platform::{HostDirs, PlatformDirs};

/// Key holding the console port, used to index the registry
pub const KEY_SERIAL: &str = "port.serial";
/// Key holding the gRPC port
pub const KEY_GRPC_PORT: &str = "grpc.port";
/// Key holding the gRPC bearer token
pub const KEY_GRPC_TOKEN: &str = "grpc.token";

/// Serial used for records that do not declare `port.serial`
pub const DEFAULT_SERIAL: &str = "0";

/// Discovery errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot determine the user directory")]
    NoUserDirectory,
}

/// Connection metadata published by one emulator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorRecord {
    values: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl EmulatorRecord {
    /// Read and parse a discovery file
    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        debug!("Discovering emulator: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut record = parse_discovery_file(&content);
        record.source = Some(path.to_path_buf());
        Ok(record)
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Registry key of this record
    pub fn serial(&self) -> &str {
        self.get(KEY_SERIAL).unwrap_or(DEFAULT_SERIAL)
    }

    pub fn grpc_port(&self) -> Option<&str> {
        self.get(KEY_GRPC_PORT)
    }

    pub fn grpc_token(&self) -> Option<&str> {
        self.get(KEY_GRPC_TOKEN)
    }

    pub fn adb_port(&self) -> Option<&str> {
        self.get("port.adb")
    }

    pub fn avd_name(&self) -> Option<&str> {
        self.get("avd.name")
    }

    /// Command line the emulator was started with
    pub fn cmdline(&self) -> Option<&str> {
        self.get("cmdline")
    }

    /// File this record was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EmulatorRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            source: None,
        }
    }
}

/// Parse discovery file content.
///
/// Lines are trimmed, the first `=` splits key from value and lines
/// without `=` are skipped. Only `\n` and `\r\n` end a line; a lone
/// `\r` stays part of the line it appears in.
pub fn parse_discovery_file(content: &str) -> EmulatorRecord {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once('='))
        .collect()
}

/// Snapshot of the emulators running when it was built
#[derive(Debug, Clone)]
pub struct EmulatorRegistry {
    discovery_dir: PathBuf,
    emulators: BTreeMap<String, EmulatorRecord>,
}

impl EmulatorRegistry {
    /// Discover emulators using the host environment
    pub fn new() -> Result<Self, DiscoveryError> {
        Self::discover(&HostDirs::from_env())
    }

    /// Discover emulators below the base directory resolved by `dirs`
    pub fn discover(dirs: &dyn PlatformDirs) -> Result<Self, DiscoveryError> {
        let discovery_dir = dirs.base_dir()?.join("avd").join("running");
        info!("Discovering emulators using {:?}", discovery_dir);

        let entries = std::fs::read_dir(&discovery_dir).map_err(|source| DiscoveryError::Io {
            path: discovery_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DiscoveryError::Io {
                path: discovery_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_ini = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".ini"))
                .unwrap_or(false);

            if is_ini && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let records = files
            .iter()
            .map(|path| EmulatorRecord::from_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_records(discovery_dir, records))
    }

    /// Build a registry from records already in memory
    pub fn from_records(
        discovery_dir: impl Into<PathBuf>,
        records: impl IntoIterator<Item = EmulatorRecord>,
    ) -> Self {
        let mut emulators = BTreeMap::new();

        for record in records {
            let serial = record.serial().to_string();
            if let Some(previous) = emulators.insert(serial.clone(), record) {
                warn!(
                    "Emulator serial {} discovered twice, replacing {:?}",
                    serial,
                    previous.source()
                );
            }
        }

        Self {
            discovery_dir: discovery_dir.into(),
            emulators,
        }
    }

    /// Directory that was scanned
    pub fn discovery_dir(&self) -> &Path {
        &self.discovery_dir
    }

    pub fn get(&self, serial: &str) -> Option<&EmulatorRecord> {
        self.emulators.get(serial)
    }

    /// First discovered emulator
    pub fn first(&self) -> Option<(&str, &EmulatorRecord)> {
        self.emulators.iter().next().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EmulatorRecord)> {
        self.emulators.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.emulators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emulators.is_empty()
    }
}
