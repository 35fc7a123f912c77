// SPDX-License-Identifier: GPL-3.0-only

//! Media controller link reset
//!
//! A crashed session can leave IPU6 links configured for the wrong sensor.
//! `media-ctl -r` resets them before the first pipeline is built.

use crate::constants::media;
use crate::errors::MediaCtlError;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Run `media-ctl -d <device> -r`
pub async fn reset_media_links(device: &str) -> Result<(), MediaCtlError> {
    reset_with(media::MEDIA_CTL, device, media::RESET_TIMEOUT).await
}

/// Run `<program> -d <device> -r` with a timeout
pub async fn reset_with(
    program: &str,
    device: &str,
    timeout: Duration,
) -> Result<(), MediaCtlError> {
    debug!(program, device, "Resetting media links");

    let child = Command::new(program)
        .args(["-d", device, "-r"])
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| MediaCtlError::Timeout {
            program: program.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|source| MediaCtlError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaCtlError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    info!(device, "Media links reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let result = reset_with(
            "surface-camera-no-such-program",
            "/dev/media0",
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(MediaCtlError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        // `false` ignores its arguments and exits 1
        let result = reset_with("false", "/dev/media0", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(MediaCtlError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_success() {
        let result = reset_with("true", "/dev/media0", Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }
}
