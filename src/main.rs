//! emu-channel - find running Android emulators and connect to their gRPC endpoint

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use emu_channel::commands::{channel_options, DiscoverySource, ListCommand, ResolveCommand};
use emu_channel::core::AppConfig;

#[derive(Parser)]
#[command(name = "emu-channel", version, about)]
struct Cli {
    /// Directory containing `avd/running`, instead of the platform default
    #[arg(long, global = true, env = "EMU_CHANNEL_DISCOVERY_DIR")]
    discovery_dir: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List running emulators
    List,
    /// Resolve a gRPC channel to an emulator
    Resolve {
        /// gRPC URI or console serial; the first emulator when omitted
        reference: Option<String>,
    },
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("emu-channel v{} starting", emu_channel::core::VERSION);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let source = DiscoverySource::from_config(cli.discovery_dir, &config);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::List => ListCommand { source }.execute(&mut stdout)?,
        Command::Resolve { reference } => {
            info!("Resolving emulator channel");
            ResolveCommand {
                source,
                options: channel_options(&config),
                reference,
            }
            .execute(&mut stdout)?
        }
    }

    Ok(())
}
