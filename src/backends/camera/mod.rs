// SPDX-License-Identifier: GPL-3.0-only

//! Media framework abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │ PipelineController  │  ← retry, settle, fault reporting
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ MediaPipeline trait │  ← state changes + message bus
//! └──────────┬──────────┘
//!            │
//!            ▼
//!       ┌─────────┐
//!       │GStreamer│  ← concrete implementation
//!       └─────────┘
//! ```
//!
//! The controller only sees the trait so its lifecycle logic can be driven
//! by scripted pipelines in tests.

pub mod description;
pub mod gstreamer;
pub mod poll_loop;
pub mod reader;

pub use description::PipelineDescription;
pub use self::gstreamer::GstLauncher;
pub use poll_loop::{LoopAction, PollLoop};
pub use reader::{FrameReader, RawFrame};

use crate::errors::PipelineError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline states, mirroring the media framework's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    /// No pending transition
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for MediaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaState::VoidPending => "VOID_PENDING",
            MediaState::Null => "NULL",
            MediaState::Ready => "READY",
            MediaState::Paused => "PAUSED",
            MediaState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}

/// Accepted outcome of a state change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Success,
    /// The transition continues in the background
    Async,
    /// Live source: reached the state but cannot preroll
    NoPreroll,
}

/// A rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("state change failed")]
pub struct StateChangeFailed;

/// Result of a blocking state query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateQuery {
    pub result: Result<StateChange, StateChangeFailed>,
    pub current: MediaState,
    pub pending: MediaState,
}

impl StateQuery {
    /// Query reported success (or live no-preroll) and the pipeline is in `state`
    pub fn settled_in(&self, state: MediaState) -> bool {
        matches!(
            self.result,
            Ok(StateChange::Success) | Ok(StateChange::NoPreroll)
        ) && self.current == state
    }
}

/// Message posted on a pipeline's bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    Warning {
        source: String,
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    /// `from_pipeline` is false for transitions of individual elements
    StateChanged {
        from_pipeline: bool,
        old: MediaState,
        current: MediaState,
        pending: MediaState,
    },
    AsyncDone,
}

/// A constructed media pipeline
///
/// Implementations must be usable from any thread: state changes are driven
/// by the switch worker while the bus is polled by the monitor thread.
pub trait MediaPipeline: Send + Sync {
    /// Textual description the pipeline was built from
    fn description(&self) -> &str;

    /// Request a transition to `state`
    fn set_state(&self, state: MediaState) -> Result<StateChange, StateChangeFailed>;

    /// Wait up to `timeout` for any pending transition to finish
    fn query_state(&self, timeout: Duration) -> StateQuery;

    /// Wait up to `timeout` for the next error, warning, EOS, state-changed
    /// or async-done message
    fn poll_event(&self, timeout: Duration) -> Option<BusEvent>;

    /// Take every queued message without waiting
    fn drain_events(&self) -> Vec<BusEvent>;

    /// Start accepting bus messages
    fn attach_listener(&self);

    /// Stop accepting bus messages and discard the queue
    ///
    /// Must be called before the pipeline is released so no message is
    /// delivered against a pipeline that no longer exists.
    fn detach_listener(&self);
}

/// Factory for media pipelines
pub trait PipelineLauncher: Send + Sync {
    fn launch(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn MediaPipeline>, PipelineError>;
}
