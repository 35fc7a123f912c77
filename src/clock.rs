// SPDX-License-Identifier: GPL-3.0-only

//! Time source for everything that waits on hardware
//!
//! The controller, coordinator and cooldown reporter never call
//! `Instant::now()` or `thread::sleep` directly so their timing can be
//! driven by a manual clock in tests.

use std::time::{Duration, Instant};

/// Monotonic clock with a blocking sleep
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`
    ///
    /// Only ever called from worker threads, never from the foreground
    /// runtime.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
