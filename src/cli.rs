use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vodstream")]
#[command(author, version, about = "Segmented VOD stream player core")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a stream headlessly, writing appended segments to a directory
    Fetch {
        /// Media playlist URL
        #[arg(required = true)]
        url: String,

        /// Output directory (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Simulated playback speed in media seconds per second
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Parse a media playlist and display its segments
    Inspect {
        /// Playlist URL or local file
        #[arg(required = true)]
        source: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
