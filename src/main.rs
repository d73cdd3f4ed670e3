// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use lookandtell::backends::camera::Size;
use lookandtell::pipeline::diagnostics::default_log_filter;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "lookandtell")]
#[command(about = "Camera preview pipeline for a visual-processing graph")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline headless with a synthetic camera
    Run {
        /// Host metadata file (default: <config dir>/lookandtell/metadata.json)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Run duration in seconds (paused and resumed halfway)
        #[arg(short, long, default_value = "4")]
        seconds: u64,

        /// Display surface width in pixels
        #[arg(long, default_value = "1080")]
        width: u32,

        /// Display surface height in pixels
        #[arg(long, default_value = "1920")]
        height: u32,

        /// Mount the synthetic sensor rotated by 90 degrees
        #[arg(long)]
        rotated: bool,

        /// Deny the camera permission instead of granting it
        #[arg(long)]
        deny_permission: bool,
    },

    /// Validate host metadata and print the resolved configuration
    CheckConfig {
        /// Host metadata file (default: <config dir>/lookandtell/metadata.json)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=lookandtell=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_filter())),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            metadata,
            seconds,
            width,
            height,
            rotated,
            deny_permission,
        } => cli::run(cli::RunOptions {
            metadata,
            seconds,
            view: Size::new(width, height),
            rotated,
            deny_permission,
        }),
        Commands::CheckConfig { metadata } => cli::check_config(metadata),
    }
}
