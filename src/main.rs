// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surface_camera::Config;
use surface_camera::constants::app_info;

mod cli;

#[derive(Parser)]
#[command(name = "surface-camera")]
#[command(about = "Switch between the Surface Pro 9 cameras without wedging the IPU6")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Configuration file (default: ~/.config/surface-camera/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive preview session (default)
    Run,

    /// List the cameras and their power status
    List,

    /// Grab a single frame with the on-demand reader
    Grab {
        /// Camera to open: front, rear or default
        #[arg(short, long, default_value = "default")]
        camera: String,

        /// Save the frame as an image (format from the extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set RUST_LOG to override, e.g. RUST_LOG=surface_camera=debug
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::List) => cli::list_cameras(&config)?,
        Some(Commands::Grab { camera, output }) => cli::grab_frame(&camera, output)?,
        Some(Commands::Run) | None => cli::run_session(config)?,
    }
    Ok(())
}
