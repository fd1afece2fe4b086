use std::path::PathBuf;

use clap::Parser;

/// Food alerts bot CLI arguments.
///
/// Every flag is optional and overrides the matching environment variable.
#[derive(Debug, Default, Parser)]
#[command(
    name = "food-alerts-bot",
    version,
    about = "Republishes UK Food Standards Agency alerts to Bluesky"
)]
pub struct Cli {
    /// Dry run: fetch and checkpoint, but never post
    #[arg(long)]
    pub debug: bool,

    /// Path of the checkpoint file
    #[arg(long)]
    pub checkpoint_file: Option<PathBuf>,

    /// Food alerts API base URL
    #[arg(long)]
    pub alerts_url: Option<String>,

    /// Feed polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Serve /health and /metrics on this port
    #[arg(long)]
    pub metrics_port: Option<u16>,
}
