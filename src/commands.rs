//! CLI commands for emu-channel
//!
//! Provides command-line interface functionality for automation and scripting.

use std::io::Write;
use std::path::PathBuf;
use anyhow::{Context, Result};
use tracing::info;

use emu_channel_core::AppConfig;
use emu_channel_emulator_bridge::{
    ChannelOptions, ChannelResolver, EmulatorRegistry, FixedDir, HostDirs,
};

/// Where to look for discovery files
#[derive(Debug, Clone, Default)]
pub struct DiscoverySource {
    /// Base directory containing `avd/running`; platform default when unset
    pub base_dir: Option<PathBuf>,
}

impl DiscoverySource {
    /// Command line flag wins over the config file
    pub fn from_config(flag: Option<PathBuf>, config: &AppConfig) -> Self {
        Self {
            base_dir: flag.or_else(|| config.discovery.base_dir.clone()),
        }
    }

    /// Scan for running emulators
    pub fn registry(&self) -> Result<EmulatorRegistry> {
        let registry = match &self.base_dir {
            Some(dir) => EmulatorRegistry::discover(&FixedDir(dir.clone())),
            None => EmulatorRegistry::discover(&HostDirs::from_env()),
        };
        registry.context("Failed to discover running emulators")
    }
}

/// Build channel options from the config file
pub fn channel_options(config: &AppConfig) -> ChannelOptions {
    ChannelOptions {
        host: config.channel.host.clone(),
        connect_timeout: config.channel.connect_timeout(),
    }
}

/// List running emulators
pub struct ListCommand {
    pub source: DiscoverySource,
}

impl ListCommand {
    /// Print one line per discovered emulator
    pub fn execute(&self, out: &mut impl Write) -> Result<()> {
        let registry = self.source.registry()?;

        writeln!(out, "Discovery directory: {}", registry.discovery_dir().display())?;
        if registry.is_empty() {
            writeln!(out, "No running emulators")?;
            return Ok(());
        }

        for (serial, emulator) in registry.iter() {
            writeln!(
                out,
                "  {} - grpc {} adb {} {} ({})",
                serial,
                emulator.grpc_port().unwrap_or("-"),
                emulator.adb_port().unwrap_or("-"),
                if emulator.grpc_token().is_some() { "token" } else { "no token" },
                emulator.avd_name().unwrap_or("Unknown"),
            )?;
        }

        Ok(())
    }
}

/// Resolve a gRPC channel
pub struct ResolveCommand {
    pub source: DiscoverySource,
    pub options: ChannelOptions,
    /// URI or console serial; first emulator when unset
    pub reference: Option<String>,
}

impl ResolveCommand {
    /// Resolve the channel and print its target
    pub fn execute(&self, out: &mut impl Write) -> Result<()> {
        let resolver = ChannelResolver::with_options(self.source.registry()?, self.options.clone());
        let channel = resolver.resolve(self.reference.as_deref())?;

        info!("Resolved channel to {}", channel.target());
        writeln!(
            out,
            "{} ({})",
            channel.target(),
            if channel.is_authenticated() { "bearer token" } else { "insecure" },
        )?;

        Ok(())
    }
}
