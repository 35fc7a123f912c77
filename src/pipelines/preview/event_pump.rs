// SPDX-License-Identifier: GPL-3.0-only

//! Bus listener for the live pipeline
//!
//! During startup the controller's worker pumps the bus synchronously. Once
//! the pipeline is running a monitor thread takes over and reacts to
//! hardware errors for the rest of the handle's lifetime.

use super::handle::{HandleState, SharedStatus};
use crate::backends::camera::{BusEvent, LoopAction, MediaPipeline, MediaState, PollLoop};
use crate::clock::Clock;
use crate::constants::timing;
use crate::events::FaultLatch;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Status shown when a running pipeline reports a hardware error
pub const HARDWARE_ERROR_STATUS: &str =
    "Camera Error - Hardware may need reset. Please restart the app.";

/// How the startup pump ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// PLAYING with nothing pending
    Playing,
    /// The driver posted an error
    Error(String),
    /// A non-blocking state query reported failure
    StateChangeFailed,
    /// The window lapsed without a verdict
    TimedOut,
}

/// What the steady-state monitor does with a bus event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpAction {
    /// Force inert, mark failed, disable switching
    Fault(String),
    Warn(String),
    EndOfStream,
    Diagnostic,
    Ignore,
}

/// Classify a steady-state bus event
///
/// Errors raised while the handle is being stopped are expected fallout of
/// the teardown and are ignored.
pub fn classify(event: &BusEvent, state: HandleState) -> PumpAction {
    match event {
        BusEvent::Error { .. } if matches!(state, HandleState::Stopping | HandleState::Idle) => {
            PumpAction::Ignore
        }
        BusEvent::Error {
            source,
            message,
            debug,
        } => PumpAction::Fault(format_error(source, message, debug.as_deref())),
        BusEvent::Warning {
            source, message, ..
        } => PumpAction::Warn(format!("{source}: {message}")),
        BusEvent::EndOfStream => PumpAction::EndOfStream,
        BusEvent::StateChanged {
            from_pipeline: true,
            ..
        } => PumpAction::Diagnostic,
        BusEvent::StateChanged { .. } | BusEvent::AsyncDone => PumpAction::Ignore,
    }
}

fn format_error(source: &str, message: &str, debug: Option<&str>) -> String {
    match debug {
        Some(debug) => format!("{source}: {message} ({debug})"),
        None => format!("{source}: {message}"),
    }
}

pub struct EventPump {
    pipeline: Arc<dyn MediaPipeline>,
    status: SharedStatus,
    monitor: Option<PollLoop>,
    attached: bool,
}

impl EventPump {
    /// Attach a listener to `pipeline`
    pub fn attach(pipeline: Arc<dyn MediaPipeline>, status: SharedStatus) -> Self {
        pipeline.attach_listener();
        Self {
            pipeline,
            status,
            monitor: None,
            attached: true,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(PollLoop::is_running)
    }

    /// Pump the bus until PLAYING, an error, or `timeout`
    pub fn await_startup(
        &self,
        clock: &dyn Clock,
        timeout: Duration,
        poll_interval: Duration,
    ) -> StartupOutcome {
        let start = clock.now();
        let mut last_progress = start;

        loop {
            let elapsed = clock.now().saturating_duration_since(start);
            if elapsed >= timeout {
                warn!(?elapsed, "Pipeline did not reach PLAYING in time");
                return StartupOutcome::TimedOut;
            }

            if let Some(event) = self.pipeline.poll_event(poll_interval) {
                match event {
                    BusEvent::Error {
                        source,
                        message,
                        debug,
                    } => {
                        let detail = format_error(&source, &message, debug.as_deref());
                        error!(error = %detail, "Error during startup");
                        return StartupOutcome::Error(detail);
                    }
                    BusEvent::StateChanged {
                        from_pipeline: true,
                        old,
                        current,
                        pending,
                    } => {
                        info!(%old, %current, %pending, "Pipeline state changed");
                    }
                    BusEvent::AsyncDone => debug!("Received ASYNC_DONE"),
                    BusEvent::Warning {
                        source, message, ..
                    } => warn!(source = %source, "{}", message),
                    _ => {}
                }
            }

            let query = self.pipeline.query_state(Duration::ZERO);
            if query.current == MediaState::Playing && query.pending == MediaState::VoidPending {
                let elapsed = clock.now().saturating_duration_since(start);
                info!(?elapsed, "Pipeline reached PLAYING");
                return StartupOutcome::Playing;
            }
            if query.result.is_err() {
                return StartupOutcome::StateChangeFailed;
            }

            let now = clock.now();
            if now.saturating_duration_since(last_progress) >= timing::PROGRESS_LOG_INTERVAL {
                info!(
                    current = %query.current,
                    pending = %query.pending,
                    elapsed = ?now.saturating_duration_since(start),
                    "Still waiting for PLAYING"
                );
                last_progress = now;
            }
        }
    }

    /// Take buffered errors after a rejected state change
    pub fn drain_errors(&self) -> Option<String> {
        let mut first = None;
        for event in self.pipeline.drain_events() {
            if let BusEvent::Error {
                source,
                message,
                debug,
            } = event
            {
                let detail = format_error(&source, &message, debug.as_deref());
                error!(error = %detail, "Error from bus");
                first.get_or_insert(detail);
            }
        }
        first
    }

    /// Hand the bus to a monitor thread for the rest of the handle's life
    pub fn start_monitoring(&mut self, fault: FaultLatch) -> std::io::Result<()> {
        if self.monitor.is_some() {
            return Ok(());
        }

        let pipeline = Arc::clone(&self.pipeline);
        let status = self.status.clone();
        let monitor = PollLoop::start("camera-bus-monitor", move || {
            let Some(event) = pipeline.poll_event(timing::BUS_POLL_INTERVAL) else {
                return LoopAction::Continue;
            };
            match classify(&event, status.get().state) {
                PumpAction::Fault(detail) => {
                    error!(error = %detail, "Hardware error on running pipeline");
                    if let Err(e) = pipeline.set_state(MediaState::Null) {
                        warn!(error = %e, "Failed to force pipeline to NULL");
                    }
                    status.update(|s| {
                        s.state = HandleState::Failed;
                        s.streaming = false;
                    });
                    fault.trip(HARDWARE_ERROR_STATUS);
                    LoopAction::Stop
                }
                PumpAction::Warn(msg) => {
                    warn!("Pipeline warning: {}", msg);
                    LoopAction::Continue
                }
                PumpAction::EndOfStream => {
                    info!("End of stream");
                    status.update(|s| s.streaming = false);
                    LoopAction::Continue
                }
                PumpAction::Diagnostic => {
                    debug!(?event, "Pipeline state changed");
                    LoopAction::Continue
                }
                PumpAction::Ignore => LoopAction::Continue,
            }
        })?;

        self.monitor = Some(monitor);
        Ok(())
    }

    /// Stop monitoring and detach the listener; idempotent
    pub fn detach(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        if self.attached {
            self.pipeline.detach_listener();
            self.attached = false;
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.detach();
    }
}
