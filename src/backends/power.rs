// SPDX-License-Identifier: GPL-3.0-only

//! Sensor runtime power management status
//!
//! Reads `<root>/<key>/power/runtime_status` and `.../power/control` from
//! sysfs. Everything here is advisory: a missing file never blocks a start.

use crate::clock::Clock;
use crate::constants::power;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Value of `power/runtime_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerStatus {
    Active,
    Suspended,
    Other(String),
}

impl PowerStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "active" => PowerStatus::Active,
            "suspended" => PowerStatus::Suspended,
            other => PowerStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerStatus::Active => f.write_str("active"),
            PowerStatus::Suspended => f.write_str("suspended"),
            PowerStatus::Other(s) => f.write_str(s),
        }
    }
}

/// Readiness verdict before a start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// No status file for this sensor
    Unavailable,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct PowerMonitor {
    root: PathBuf,
}

impl PowerMonitor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn power_file(&self, key: &str, name: &str) -> PathBuf {
        self.root.join(key).join("power").join(name)
    }

    /// Current runtime status, `None` when the file is absent or unreadable
    pub fn read(&self, key: &str) -> Option<PowerStatus> {
        let path = self.power_file(key, "runtime_status");
        match std::fs::read_to_string(&path) {
            Ok(raw) => Some(PowerStatus::parse(&raw)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No power status");
                None
            }
        }
    }

    /// Runtime PM control policy (`auto` or `on`)
    pub fn control(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.power_file(key, "control"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Poll until the sensor reports `active`
    pub fn wait_until_active(&self, key: &str, clock: &dyn Clock, poll: &BoundedPoll) -> Readiness {
        if self.read(key).is_none() {
            debug!(key, "Power status unavailable, not waiting");
            return Readiness::Unavailable;
        }

        match poll.until(clock, || self.read(key) == Some(PowerStatus::Active)) {
            PollOutcome::Satisfied(elapsed) => {
                info!(key, ?elapsed, "Sensor is active");
                Readiness::Ready
            }
            PollOutcome::TimedOut(elapsed) => {
                warn!(key, ?elapsed, "Sensor did not become active");
                Readiness::TimedOut
            }
        }
    }
}

/// Result of a [`BoundedPoll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied(Duration),
    TimedOut(Duration),
}

/// Repeatedly evaluate a predicate at a fixed interval up to a maximum wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPoll {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for BoundedPoll {
    fn default() -> Self {
        Self {
            interval: power::POLL_INTERVAL,
            max_wait: power::MAX_WAIT,
        }
    }
}

impl BoundedPoll {
    pub fn until<F>(&self, clock: &dyn Clock, mut predicate: F) -> PollOutcome
    where
        F: FnMut() -> bool,
    {
        let start = clock.now();
        loop {
            let elapsed = clock.now().saturating_duration_since(start);
            if predicate() {
                return PollOutcome::Satisfied(elapsed);
            }
            if elapsed >= self.max_wait {
                return PollOutcome::TimedOut(elapsed);
            }
            clock.sleep(self.interval);
        }
    }
}
