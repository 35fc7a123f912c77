// SPDX-License-Identifier: GPL-3.0-only

//! Preview pipeline lifecycle

pub mod controller;
pub mod event_pump;
pub mod handle;

pub use controller::{ControllerOptions, PipelineController, RetryPolicy};
pub use event_pump::{EventPump, HARDWARE_ERROR_STATUS, PumpAction, StartupOutcome};
pub use handle::{HandleState, HandleStatus, PipelineHandle};
