//! emu-channel Core - Configuration and shared types
//!
//! This crate provides the configuration file format and the error type
//! shared by the emu-channel binary.

pub mod config;
pub mod error;

pub use config::{AppConfig, ChannelConfig, DiscoveryConfig};
pub use error::{EmuChannelError, Result};

/// emu-channel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
