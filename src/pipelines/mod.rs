// SPDX-License-Identifier: GPL-3.0-only

//! Live preview pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ libcamerasrc │ ──▶ │ Preview Pipeline  │ ──▶ │ Display Sink │
//! │  (IPU6)      │     │  - leaky queue    │     │              │
//! │              │     │  - 1280×720 caps  │     │              │
//! │              │     │  - rotate 180°    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`preview`]: start/stop with bounded waits, retry and bus monitoring

pub mod preview;
