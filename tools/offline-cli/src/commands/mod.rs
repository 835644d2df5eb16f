//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod simulate;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use offline_core::{OfflineConfig, Uri};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// URLs to classify. Paths starting with '/' resolve against the origin.
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// File to write (TOML, or JSON for a .json path).
        #[arg(short, long, default_value = "offline.toml")]
        path: String,

        /// Origin the pre-cache paths resolve against.
        #[arg(long)]
        origin: Option<String>,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// URLs to request after promotion. Defaults to the pre-cache list plus
    /// one URL per configured host.
    pub urls: Vec<String>,

    /// Replay the requests a second time with the network down.
    #[arg(long)]
    pub offline: bool,

    /// Make fetches of this URL fail (repeatable).
    #[arg(long = "fail", value_name = "URL")]
    pub fail: Vec<String>,
}

/// Parse a URL, resolving paths against the configured origin.
pub fn resolve_target(config: &OfflineConfig, target: &str) -> Result<Uri> {
    if target.starts_with('/') {
        return Ok(config.resolve(target)?);
    }
    target
        .parse::<Uri>()
        .with_context(|| format!("Invalid URL: {}", target))
}
