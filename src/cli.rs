// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Interactive preview session driven from stdin
//! - Listing the sensors with their power status
//! - Grabbing one frame with the on-demand reader

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use surface_camera::backends::camera::{FrameReader, GstLauncher};
use surface_camera::backends::power::PowerMonitor;
use surface_camera::{App, AppError, AppResult, CameraId, Command, Config, Event, SystemClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Map one line of input to a command
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "s" | "switch" => Some(Command::SwitchRequested),
        "o" | "folder" => Some(Command::FolderOpenRequested),
        "q" | "quit" | "exit" => Some(Command::Quit),
        other => other.parse::<CameraId>().ok().map(Command::SelectCamera),
    }
}

fn print_event(event: &Event) {
    match event {
        Event::StatusChanged { text, busy } if text.is_empty() => {
            debug!(busy, "Status cleared");
        }
        Event::StatusChanged { text, busy } => {
            let marker = if *busy { "…" } else { "" };
            println!("[status] {text}{marker}");
        }
        Event::ButtonState { label, enabled } => {
            let state = if *enabled { "enabled" } else { "disabled" };
            println!("[button] {label} ({state})");
        }
        Event::SwitchFinished { .. } => {}
    }
}

/// Run the interactive session until `quit`, EOF or Ctrl-C
pub fn run_session(config: Config) -> AppResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let launcher = GstLauncher::new()?;
        let app = App::new(config, Arc::new(launcher), Arc::new(SystemClock));

        let (commands, receiver) = mpsc::channel(16);
        tokio::spawn(async move {
            println!("Commands: s/switch, front, rear, folder, quit");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_command(&line) {
                    Some(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {}", line.trim()),
                }
            }
            // EOF ends the session like `quit`
            let _ = commands.send(Command::Quit).await;
        });

        app.run(receiver, print_event).await;
        Ok::<(), AppError>(())
    })?;

    // The stdin reader sits in a blocking read; don't wait for it
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(())
}

/// Print the sensors and their runtime PM status
pub fn list_cameras(config: &Config) -> AppResult<()> {
    let power = PowerMonitor::new(&config.power_status_root);

    println!("Cameras:");
    println!();
    for profile in surface_camera::profiles::all() {
        let status = power
            .read(profile.power_status_key)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unavailable".to_string());
        println!("  [{}] {}", profile.id, profile.display_label);
        println!("      Source: {}", profile.hardware_source_name);
        println!("      Power:  {} ({})", status, profile.power_status_key);
        println!("      Settle: {:?}", profile.settle_delay);
        println!();
    }
    Ok(())
}

/// Open the reader, pull one frame and optionally save it
pub fn grab_frame(camera: &str, output: Option<PathBuf>) -> AppResult<()> {
    let camera_name = match camera.trim().to_ascii_lowercase().as_str() {
        "default" | "" => None,
        other => {
            let id = other
                .parse::<CameraId>()
                .map_err(|e| AppError::Other(e.to_string()))?;
            Some(id.profile().hardware_source_name)
        }
    };

    let mut reader = FrameReader::open(camera_name)?;
    println!("Reader playing: {}", reader.grab());

    let frame = reader
        .read()?
        .ok_or_else(|| AppError::Other("no frame received".into()))?;
    println!("Got {}x{} BGR frame ({} bytes)", frame.width, frame.height, frame.data.len());
    reader.release();

    if let Some(path) = output {
        let image = frame
            .to_rgb_image()
            .ok_or_else(|| AppError::Other("frame size does not match its data".into()))?;
        image
            .save(&path)
            .map_err(|e| AppError::Other(format!("failed to save {}: {e}", path.display())))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
