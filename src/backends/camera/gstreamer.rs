// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer implementation of [`MediaPipeline`]

use super::{
    BusEvent, MediaPipeline, MediaState, PipelineDescription, PipelineLauncher, StateChange,
    StateChangeFailed, StateQuery,
};
use crate::errors::PipelineError;
use gstreamer::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message types the lifecycle code cares about
const WATCHED: &[gstreamer::MessageType] = &[
    gstreamer::MessageType::Error,
    gstreamer::MessageType::Warning,
    gstreamer::MessageType::Eos,
    gstreamer::MessageType::StateChanged,
    gstreamer::MessageType::AsyncDone,
];

/// Builds pipelines with `gst_parse_launch`
#[derive(Debug)]
pub struct GstLauncher {
    _private: (),
}

impl GstLauncher {
    /// Initialise GStreamer; safe to call more than once
    pub fn new() -> Result<Self, gstreamer::glib::Error> {
        gstreamer::init()?;
        Ok(Self { _private: () })
    }
}

impl PipelineLauncher for GstLauncher {
    fn launch(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn MediaPipeline>, PipelineError> {
        let pipeline = GstPipeline::launch(&description.to_string())?;
        Ok(Arc::new(pipeline))
    }
}

/// A parsed GStreamer pipeline and its bus
pub struct GstPipeline {
    pipeline: gstreamer::Pipeline,
    bus: gstreamer::Bus,
    description: String,
}

impl GstPipeline {
    pub fn launch(description: &str) -> Result<Self, PipelineError> {
        info!(pipeline = %description, "Launching pipeline");

        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| PipelineError::Launch(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| PipelineError::Launch("description is not a pipeline".into()))?;
        let bus = pipeline
            .bus()
            .ok_or_else(|| PipelineError::Launch("pipeline has no bus".into()))?;

        // No listener until the event pump attaches
        bus.set_flushing(true);

        Ok(Self {
            pipeline,
            bus,
            description: description.to_string(),
        })
    }

    pub fn pipeline(&self) -> &gstreamer::Pipeline {
        &self.pipeline
    }

    fn convert(&self, msg: &gstreamer::Message) -> Option<BusEvent> {
        use gstreamer::MessageView;

        let source_name = || {
            msg.src()
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        match msg.view() {
            MessageView::Error(err) => Some(BusEvent::Error {
                source: source_name(),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            }),
            MessageView::Warning(w) => Some(BusEvent::Warning {
                source: source_name(),
                message: w.error().to_string(),
                debug: w.debug().map(|d| d.to_string()),
            }),
            MessageView::Eos(_) => Some(BusEvent::EndOfStream),
            MessageView::StateChanged(sc) => Some(BusEvent::StateChanged {
                from_pipeline: msg.src() == Some(self.pipeline.upcast_ref::<gstreamer::Object>()),
                old: from_gst_state(sc.old()),
                current: from_gst_state(sc.current()),
                pending: from_gst_state(sc.pending()),
            }),
            MessageView::AsyncDone(_) => Some(BusEvent::AsyncDone),
            _ => None,
        }
    }
}

impl MediaPipeline for GstPipeline {
    fn description(&self) -> &str {
        &self.description
    }

    fn set_state(&self, state: MediaState) -> Result<StateChange, StateChangeFailed> {
        self.pipeline
            .set_state(to_gst_state(state))
            .map(from_gst_success)
            .map_err(|_| StateChangeFailed)
    }

    fn query_state(&self, timeout: Duration) -> StateQuery {
        let (result, current, pending) = self.pipeline.state(clock_time(timeout));
        StateQuery {
            result: result.map(from_gst_success).map_err(|_| StateChangeFailed),
            current: from_gst_state(current),
            pending: from_gst_state(pending),
        }
    }

    fn poll_event(&self, timeout: Duration) -> Option<BusEvent> {
        let msg = self.bus.timed_pop_filtered(clock_time(timeout), WATCHED)?;
        self.convert(&msg)
    }

    fn drain_events(&self) -> Vec<BusEvent> {
        let mut events = Vec::new();
        while let Some(msg) = self.bus.pop_filtered(WATCHED) {
            if let Some(event) = self.convert(&msg) {
                events.push(event);
            }
        }
        events
    }

    fn attach_listener(&self) {
        debug!("Attaching bus listener");
        self.bus.set_flushing(false);
    }

    fn detach_listener(&self) {
        debug!("Detaching bus listener");
        self.bus.set_flushing(true);
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        self.bus.set_flushing(true);
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = ?e, "Failed to set pipeline to NULL on drop");
        }
    }
}

fn clock_time(duration: Duration) -> gstreamer::ClockTime {
    gstreamer::ClockTime::from_mseconds(duration.as_millis() as u64)
}

fn to_gst_state(state: MediaState) -> gstreamer::State {
    match state {
        MediaState::VoidPending => gstreamer::State::VoidPending,
        MediaState::Null => gstreamer::State::Null,
        MediaState::Ready => gstreamer::State::Ready,
        MediaState::Paused => gstreamer::State::Paused,
        MediaState::Playing => gstreamer::State::Playing,
    }
}

fn from_gst_state(state: gstreamer::State) -> MediaState {
    match state {
        gstreamer::State::Null => MediaState::Null,
        gstreamer::State::Ready => MediaState::Ready,
        gstreamer::State::Paused => MediaState::Paused,
        gstreamer::State::Playing => MediaState::Playing,
        _ => MediaState::VoidPending,
    }
}

fn from_gst_success(success: gstreamer::StateChangeSuccess) -> StateChange {
    match success {
        gstreamer::StateChangeSuccess::Async => StateChange::Async,
        gstreamer::StateChangeSuccess::NoPreroll => StateChange::NoPreroll,
        _ => StateChange::Success,
    }
}
