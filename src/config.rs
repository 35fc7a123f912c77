// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{app_info, media, pipeline, power};
use crate::errors::ConfigError;
use crate::profiles::CameraId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// User configuration
///
/// Only deployment details live here. Lifecycle timings are fixed in
/// [`crate::constants`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera started when the session begins
    pub start_camera: CameraId,
    /// Display sink element at the end of the preview pipeline
    pub video_sink: String,
    /// Media controller node reset at startup
    pub media_device: String,
    /// Run `media-ctl -r` before the first pipeline is built
    pub reset_media_links: bool,
    /// Folder opened by the "open photos" command
    pub photos_dir: PathBuf,
    /// Root of the I2C sysfs tree holding `power/runtime_status`
    pub power_status_root: PathBuf,
    /// Poll the sensor's runtime PM status before each start
    pub wait_for_power_ready: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_camera: CameraId::Front,
            video_sink: pipeline::DEFAULT_VIDEO_SINK.to_string(),
            media_device: media::DEFAULT_DEVICE.to_string(),
            reset_media_links: true,
            photos_dir: default_photos_dir(),
            power_status_root: PathBuf::from(power::SYSFS_I2C_ROOT),
            // Sensors stay suspended until libcamera opens them, so polling
            // first only adds latency on this hardware
            wait_for_power_ready: false,
        }
    }
}

impl Config {
    /// Default location: `$XDG_CONFIG_HOME/surface-camera/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR_NAME).join("config.json"))
    }

    /// Load from `path`, or the default location when `None`
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse a JSON document; absent fields take their defaults
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// `~/Pictures/SurfaceCamera`, falling back to the home or current directory
fn default_photos_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(app_info::PHOTOS_FOLDER)
}
