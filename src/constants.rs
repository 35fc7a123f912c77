// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! The lifecycle timings below were tuned against the Surface Pro 9 IPU6
//! sensors and are not exposed through
//! [`crate::config::Config`].

use std::time::Duration;

/// Pipeline lifecycle timing
pub mod timing {
    use super::Duration;

    /// How long `stop` waits for the pipeline to confirm the NULL state
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upper bound for the startup bus pump (sensors can be slow to wake)
    pub const START_TIMEOUT: Duration = Duration::from_secs(20);

    /// Blocking state query after the startup pump window lapses
    pub const FINAL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

    /// Granularity of the startup and steady-state bus polls
    pub const BUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Pause before draining the bus after an immediate state-change failure
    pub const ERROR_DRAIN_DELAY: Duration = Duration::from_millis(100);

    /// Pause after dropping a pipeline stuck in PAUSED back to NULL
    pub const STUCK_RECOVERY_DELAY: Duration = Duration::from_millis(500);

    /// Interval between "still waiting" progress logs during startup
    pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(2);

    /// Minimum time between two completed switches
    pub const MIN_SWITCH_INTERVAL: Duration = Duration::from_secs(2);

    /// Cooldown reporter tick
    pub const STATUS_TICK: Duration = Duration::from_millis(100);

    /// How long transient status messages stay visible
    pub const STATUS_FLASH: Duration = Duration::from_secs(2);
}

/// Retry/backoff for pipeline startup
pub mod retry {
    use super::Duration;

    /// Extra attempts after the first one
    pub const MAX_RETRIES: u32 = 2;

    /// Delay before the first retry
    pub const BASE_DELAY: Duration = Duration::from_secs(2);

    /// Growth factor applied after each retry
    pub const MULTIPLIER: f64 = 1.5;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Preview resolution negotiated with the sensor
    pub const PREVIEW_WIDTH: u32 = 1280;
    pub const PREVIEW_HEIGHT: u32 = 720;

    /// On-demand reader resolution
    pub const READER_WIDTH: u32 = 640;
    pub const READER_HEIGHT: u32 = 480;
    pub const READER_FRAMERATE: u32 = 30;

    /// Buffers held by the leaky queue behind the source
    pub const QUEUE_MAX_BUFFERS: u32 = 3;

    /// GStreamer element used as the hardware source
    pub const SOURCE_ELEMENT: &str = "libcamerasrc";

    /// Name given to the sink element of every pipeline we build
    pub const SINK_NAME: &str = "sink";

    /// Display sink used when the configuration does not name one
    pub const DEFAULT_VIDEO_SINK: &str = "autovideosink";
}

/// Sensor power management (sysfs runtime PM)
pub mod power {
    use super::Duration;

    /// Default root of the I2C device tree in sysfs
    pub const SYSFS_I2C_ROOT: &str = "/sys/bus/i2c/devices";

    /// Poll interval while waiting for a sensor to report `active`
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Give up waiting for `active` after this long
    pub const MAX_WAIT: Duration = Duration::from_secs(10);
}

/// Media controller reset run once at startup
pub mod media {
    use super::Duration;

    pub const DEFAULT_DEVICE: &str = "/dev/media0";
    pub const MEDIA_CTL: &str = "media-ctl";
    pub const RESET_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Application information utilities
pub mod app_info {
    /// Application version from the build script
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Directory name used under the XDG config and pictures directories
    pub const APP_DIR_NAME: &str = "surface-camera";

    /// Folder under the user's pictures directory
    pub const PHOTOS_FOLDER: &str = "SurfaceCamera";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_constants_match_tuning() {
        let first = retry::BASE_DELAY;
        let second = first.mul_f64(retry::MULTIPLIER);
        assert_eq!(first, Duration::from_secs(2));
        assert_eq!(second, Duration::from_secs(3));
    }

    #[test]
    fn test_status_tick_divides_interval() {
        assert_eq!(
            timing::MIN_SWITCH_INTERVAL.as_millis() % timing::STATUS_TICK.as_millis(),
            0
        );
    }
}
