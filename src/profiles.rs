// SPDX-License-Identifier: GPL-3.0-only

//! Camera profile registry
//!
//! The two IPU6 sensors of the Surface Pro 9. Both hang off the same media
//! controller, so only one of them may be streaming at any time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifies one of the two sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraId {
    /// User-facing OV5693
    #[default]
    Front,
    /// World-facing OV13858
    Rear,
}

impl CameraId {
    pub const ALL: [CameraId; 2] = [CameraId::Front, CameraId::Rear];

    /// The sensor a toggle would switch to
    pub fn other(self) -> Self {
        match self {
            CameraId::Front => CameraId::Rear,
            CameraId::Rear => CameraId::Front,
        }
    }

    /// Short capitalised name used in button labels
    pub fn short_name(self) -> &'static str {
        match self {
            CameraId::Front => "Front",
            CameraId::Rear => "Rear",
        }
    }

    /// Static profile for this sensor
    pub fn profile(self) -> &'static CameraProfile {
        profile(self)
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Front => write!(f, "front"),
            CameraId::Rear => write!(f, "rear"),
        }
    }
}

/// Error returned when parsing an unknown camera name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown camera '{0}' (expected 'front' or 'rear')")]
pub struct UnknownCamera(pub String);

impl FromStr for CameraId {
    type Err = UnknownCamera;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "f" => Ok(CameraId::Front),
            "rear" | "back" | "r" => Ok(CameraId::Rear),
            other => Err(UnknownCamera(other.to_string())),
        }
    }
}

/// Immutable description of a sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraProfile {
    pub id: CameraId,
    /// libcamera camera name (ACPI path), unescaped
    pub hardware_source_name: &'static str,
    pub display_label: &'static str,
    /// I2C device name under `/sys/bus/i2c/devices`
    pub power_status_key: &'static str,
    /// Quiesce time after this sensor's pipeline is released
    pub settle_delay: Duration,
}

static FRONT: CameraProfile = CameraProfile {
    id: CameraId::Front,
    hardware_source_name: r"\_SB_.PC00.I2C3.CAMF",
    display_label: "Front Camera (OV5693)",
    power_status_key: "i2c-OVTI5693:00",
    // OV5693 is slow to let go of the bus
    settle_delay: Duration::from_millis(1000),
};

static REAR: CameraProfile = CameraProfile {
    id: CameraId::Rear,
    hardware_source_name: r"\_SB_.PC00.I2C2.CAMR",
    display_label: "Rear Camera (OV13858)",
    power_status_key: "i2c-OVTID858:00",
    settle_delay: Duration::from_millis(500),
};

/// Look up the profile for a sensor
pub fn profile(id: CameraId) -> &'static CameraProfile {
    match id {
        CameraId::Front => &FRONT,
        CameraId::Rear => &REAR,
    }
}

/// All profiles, front first
pub fn all() -> [&'static CameraProfile; 2] {
    [&FRONT, &REAR]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_delays() {
        assert_eq!(profile(CameraId::Front).settle_delay, Duration::from_secs(1));
        assert_eq!(
            profile(CameraId::Rear).settle_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_other_is_involution() {
        for id in CameraId::ALL {
            assert_ne!(id.other(), id);
            assert_eq!(id.other().other(), id);
        }
    }

    #[test]
    fn test_hardware_names_are_single_backslash() {
        for p in all() {
            assert!(p.hardware_source_name.starts_with(r"\_SB_"));
            assert!(!p.hardware_source_name.contains(r"\\"));
        }
    }

    #[test]
    fn test_parse_camera_id() {
        assert_eq!("Front".parse::<CameraId>(), Ok(CameraId::Front));
        assert_eq!(" back ".parse::<CameraId>(), Ok(CameraId::Rear));
        assert!("side".parse::<CameraId>().is_err());
    }
}
