// SPDX-License-Identifier: GPL-3.0-only

//! The single live preview pipeline

use super::event_pump::EventPump;
use crate::backends::camera::{MediaPipeline, MediaState, StateQuery};
use crate::profiles::CameraProfile;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle of a [`PipelineHandle`]
///
/// `Idle → Starting → {Playing, PausedPrerolled} → Stopping → Idle`.
/// `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Idle,
    Starting,
    Playing,
    /// Live source reached PAUSED with nothing pending; frames follow
    PausedPrerolled,
    Stopping,
    Failed,
}

impl HandleState {
    pub fn is_running(self) -> bool {
        matches!(self, HandleState::Playing | HandleState::PausedPrerolled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleStatus {
    pub state: HandleState,
    pub streaming: bool,
}

/// Status shared between the controller and the monitor thread
#[derive(Debug, Clone)]
pub struct SharedStatus(Arc<Mutex<HandleStatus>>);

impl SharedStatus {
    pub fn new(state: HandleState) -> Self {
        Self(Arc::new(Mutex::new(HandleStatus {
            state,
            streaming: false,
        })))
    }

    pub fn get(&self) -> HandleStatus {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update(&self, f: impl FnOnce(&mut HandleStatus)) {
        let mut status = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut status);
    }

    pub fn set_state(&self, state: HandleState) {
        self.update(|s| s.state = state);
    }
}

/// Owns one pipeline and its listener
///
/// Dropping the handle detaches the listener before the pipeline goes.
pub struct PipelineHandle {
    profile: &'static CameraProfile,
    pipeline: Arc<dyn MediaPipeline>,
    status: SharedStatus,
    pump: Option<EventPump>,
    released: bool,
}

impl PipelineHandle {
    pub fn new(profile: &'static CameraProfile, pipeline: Arc<dyn MediaPipeline>) -> Self {
        Self {
            profile,
            pipeline,
            status: SharedStatus::new(HandleState::Starting),
            pump: None,
            released: false,
        }
    }

    pub fn profile(&self) -> &'static CameraProfile {
        self.profile
    }

    pub fn pipeline(&self) -> &Arc<dyn MediaPipeline> {
        &self.pipeline
    }

    pub fn status(&self) -> HandleStatus {
        self.status.get()
    }

    pub fn shared_status(&self) -> &SharedStatus {
        &self.status
    }

    pub fn set_state(&self, state: HandleState) {
        self.status.set_state(state);
    }

    pub fn listener_attached(&self) -> bool {
        self.pump.as_ref().is_some_and(EventPump::is_attached)
    }

    /// Attach the event pump; a no-op when one is already attached
    pub fn attach_pump(&mut self) -> &mut EventPump {
        let pipeline = &self.pipeline;
        let status = &self.status;
        self.pump
            .get_or_insert_with(|| EventPump::attach(Arc::clone(pipeline), status.clone()))
    }

    pub fn pump(&self) -> Option<&EventPump> {
        self.pump.as_ref()
    }

    pub fn pump_mut(&mut self) -> Option<&mut EventPump> {
        self.pump.as_mut()
    }

    /// Force the pipeline inert, wait for confirmation, then detach
    ///
    /// The listener is detached whether or not NULL was confirmed.
    pub fn release(mut self, confirm_timeout: Duration) -> StateQuery {
        self.set_state(HandleState::Stopping);
        self.status.update(|s| s.streaming = false);

        if let Err(e) = self.pipeline.set_state(MediaState::Null) {
            warn!(camera = %self.profile.id, error = %e, "Failed to request NULL");
        }
        let query = self.pipeline.query_state(confirm_timeout);
        debug!(
            camera = %self.profile.id,
            current = %query.current,
            pending = %query.pending,
            "Release state query finished"
        );

        if let Some(mut pump) = self.pump.take() {
            pump.detach();
        }
        self.set_state(HandleState::Idle);
        self.released = true;
        query
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!(camera = %self.profile.id, "PipelineHandle dropped without release");
        if let Some(mut pump) = self.pump.take() {
            pump.detach();
        }
        let _ = self.pipeline.set_state(MediaState::Null);
    }
}
