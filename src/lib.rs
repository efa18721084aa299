//! emu-channel - gRPC channels to running Android emulators
//!
//! Every running emulator publishes a small `key=value` descriptor in a
//! platform specific `avd/running` directory. This workspace discovers
//! those descriptors and opens tonic channels to the emulators, adding
//! the emulator's bearer token to each call when one is published.
//!
//! ## Architecture
//!
//! - `emu-channel-core`: configuration and the shared error type
//! - `emu-channel-emulator-bridge`: discovery, registry and channel resolution

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use emu_channel_core as core;
pub use emu_channel_emulator_bridge as emulator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use emu_channel_core::AppConfig;
    pub use emu_channel_emulator_bridge::{
        emulator_channel, ChannelResolver, EmulatorChannel, EmulatorRegistry,
    };
}
