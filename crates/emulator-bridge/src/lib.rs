//! Android Emulator Bridge
//!
//! Discovers locally running emulators and opens gRPC channels to them.

pub mod platform;
pub mod discovery;
pub mod channel;

pub use platform::{PlatformDirs, HostDirs, HostOs, FixedDir};
pub use discovery::{EmulatorRegistry, EmulatorRecord, DiscoveryError, parse_discovery_file};
pub use channel::{
    ChannelResolver, ChannelOptions, ChannelError, EmulatorChannel, BearerInterceptor, with_bearer,
    emulator_channel, is_uri,
};

