// SPDX-License-Identifier: GPL-3.0-only

//! Surface Camera - lifecycle manager for dual-sensor libcamera pipelines
//!
//! The Surface Pro 9 exposes two IPU6 sensors behind a single media
//! controller. Only one may stream at a time and both need time to release
//! the hardware after their pipeline is torn down. This crate serialises
//! switches between them, retries slow starts, and reports status through a
//! plain command/event channel so any front end can drive it.
//!
//! # Architecture
//!
//! - [`profiles`]: compiled-in sensor descriptions
//! - [`backends`]: GStreamer pipelines, sysfs power status, media-ctl
//! - [`pipelines`]: preview start/stop, retry and bus monitoring
//! - [`app`]: switch coordination, cooldown reporting, command dispatch
//! - [`events`]: the command/event contract
//! - [`config`]: user configuration

pub mod app;
pub mod backends;
pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod pipelines;
pub mod profiles;

// Re-export commonly used types
pub use app::{App, SwitchCoordinator, SwitchResponse};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use events::{Command, Event, EventSender, FaultLatch};
pub use profiles::{CameraId, CameraProfile};
