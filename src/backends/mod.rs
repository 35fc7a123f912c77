// SPDX-License-Identifier: GPL-3.0-only

//! Hardware-facing collaborators
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────┐   ┌──────────────────┐     │
//! │  │    Camera    │   │  Power status    │     │
//! │  │  (GStreamer) │   │    (sysfs)       │     │
//! │  └──────────────┘   └──────────────────┘     │
//! │                     ┌──────────────────┐     │
//! │                     │  Media links     │     │
//! │                     │   (media-ctl)    │     │
//! │                     └──────────────────┘     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod media_ctl;
pub mod power;
