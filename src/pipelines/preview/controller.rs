// SPDX-License-Identifier: GPL-3.0-only

//! Preview pipeline controller
//!
//! Owns at most one [`PipelineHandle`]. `stop` fully releases it (listener
//! included) and waits out the sensor's settle delay before a `start` may
//! build the next one. `start` retries with exponential backoff and tears
//! every failed attempt down completely.
//!
//! All methods block; they are meant to run on the switch worker thread.

use super::event_pump::StartupOutcome;
use super::handle::{HandleState, PipelineHandle};
use crate::backends::camera::{MediaState, PipelineDescription, PipelineLauncher};
use crate::backends::power::{BoundedPoll, PowerMonitor};
use crate::clock::Clock;
use crate::constants::{pipeline, retry, timing};
use crate::errors::{PipelineError, StartFailure};
use crate::events::{EventSender, FaultLatch};
use crate::profiles::{CameraId, CameraProfile};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Startup retry schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry::MAX_RETRIES,
            base_delay: retry::BASE_DELAY,
            multiplier: retry::MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry `n` (1-based)
    pub fn delay_before(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exponent))
    }

    /// Every backoff in order
    pub fn delays(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|n| self.delay_before(n)).collect()
    }
}

/// Deployment knobs for the controller
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub video_sink: String,
    pub retry: RetryPolicy,
    pub power: Option<PowerMonitor>,
    pub wait_for_power_ready: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            video_sink: pipeline::DEFAULT_VIDEO_SINK.to_string(),
            retry: RetryPolicy::default(),
            power: None,
            wait_for_power_ready: false,
        }
    }
}

pub struct PipelineController {
    launcher: Arc<dyn PipelineLauncher>,
    clock: Arc<dyn Clock>,
    options: ControllerOptions,
    events: EventSender,
    fault: FaultLatch,
    handle: Option<PipelineHandle>,
    /// Reported when no handle exists
    idle_state: HandleState,
}

impl PipelineController {
    pub fn new(
        launcher: Arc<dyn PipelineLauncher>,
        clock: Arc<dyn Clock>,
        options: ControllerOptions,
        events: EventSender,
        fault: FaultLatch,
    ) -> Self {
        Self {
            launcher,
            clock,
            options,
            events,
            fault,
            handle: None,
            idle_state: HandleState::Idle,
        }
    }

    /// Camera of the live handle, if any
    pub fn active_camera(&self) -> Option<CameraId> {
        self.handle.as_ref().map(|h| h.profile().id)
    }

    pub fn state(&self) -> HandleState {
        self.handle
            .as_ref()
            .map(|h| h.status().state)
            .unwrap_or(self.idle_state)
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.status().streaming)
    }

    pub fn listener_attached(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(PipelineHandle::listener_attached)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.options.retry
    }

    /// Release the live pipeline, then wait out its settle delay
    ///
    /// Returns the camera that was stopped. A NULL confirmation timeout is
    /// logged and otherwise ignored.
    pub fn stop(&mut self) -> Option<CameraId> {
        let handle = self.handle.take()?;
        let profile = handle.profile();
        info!(camera = %profile.id, "Stopping pipeline");

        let query = handle.release(timing::STOP_TIMEOUT);
        if query.settled_in(MediaState::Null) {
            info!(camera = %profile.id, "Pipeline stopped");
        } else {
            warn!(
                camera = %profile.id,
                current = %query.current,
                pending = %query.pending,
                "Pipeline did not confirm NULL, continuing"
            );
        }
        self.idle_state = HandleState::Idle;

        info!(
            camera = %profile.id,
            settle = ?profile.settle_delay,
            "Waiting for sensor to release"
        );
        self.clock.sleep(profile.settle_delay);
        Some(profile.id)
    }

    /// Start a preview for `profile`, retrying per the policy
    pub fn start(&mut self, profile: &'static CameraProfile) -> Result<(), StartFailure> {
        if self.handle.is_some() {
            debug!("Start requested with a live pipeline, stopping it first");
            self.stop();
        }

        self.prepare_power(profile);
        self.events
            .status(format!("Starting {} camera preview...", profile.id), true);
        info!(camera = %profile.id, label = profile.display_label, "Starting preview");

        let policy = self.options.retry;
        let mut retry = 0;
        loop {
            match self.attempt(profile) {
                Ok(handle) => {
                    info!(camera = %profile.id, attempt = retry + 1, "Preview started");
                    self.handle = Some(handle);
                    self.idle_state = HandleState::Idle;
                    self.events.status("", false);
                    return Ok(());
                }
                Err(e) => {
                    warn!(camera = %profile.id, attempt = retry + 1, error = %e, "Start attempt failed");
                    if retry >= policy.max_retries {
                        error!(camera = %profile.id, "Retries exhausted");
                        self.idle_state = HandleState::Failed;
                        return Err(StartFailure {
                            camera: profile.id,
                            attempts: policy.attempts(),
                            last_error: e,
                        });
                    }
                }
            }

            retry += 1;
            let delay = policy.delay_before(retry);
            info!(retry, max = policy.max_retries, ?delay, "Retrying camera start");
            self.events.status(
                format!(
                    "Retrying camera start... (attempt {retry}/{})",
                    policy.max_retries
                ),
                true,
            );
            self.clock.sleep(delay);
        }
    }

    /// Release the pipeline without waiting for the sensor to settle
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!(camera = %handle.profile().id, "Releasing pipeline");
            let query = handle.release(timing::FINAL_CONFIRM_TIMEOUT);
            if !query.settled_in(MediaState::Null) {
                warn!(current = %query.current, "Pipeline did not confirm NULL on shutdown");
            }
        }
    }

    /// Log the sensor's runtime PM control and optionally wait for `active`
    fn prepare_power(&self, profile: &CameraProfile) {
        let Some(power) = &self.options.power else {
            return;
        };
        match power.control(profile.power_status_key) {
            Some(control) => info!(camera = %profile.id, control = %control, "Camera power control"),
            None => debug!(camera = %profile.id, "No power control file"),
        }
        if self.options.wait_for_power_ready {
            let readiness = power.wait_until_active(
                profile.power_status_key,
                self.clock.as_ref(),
                &BoundedPoll::default(),
            );
            debug!(camera = %profile.id, ?readiness, "Power readiness");
        }
    }

    /// One launch → attach → PLAYING attempt
    fn attempt(&self, profile: &'static CameraProfile) -> Result<PipelineHandle, PipelineError> {
        let description =
            PipelineDescription::preview(profile.hardware_source_name, &self.options.video_sink);
        let pipeline = self.launcher.launch(&description)?;

        let mut handle = PipelineHandle::new(profile, pipeline);
        handle.attach_pump();

        if let Err(e) = handle.pipeline().set_state(MediaState::Playing) {
            self.clock.sleep(timing::ERROR_DRAIN_DELAY);
            let detail = handle
                .pump()
                .and_then(|pump| pump.drain_errors())
                .unwrap_or_else(|| format!("{e} (no error details)"));
            self.teardown(handle);
            return Err(PipelineError::StateChange {
                target: MediaState::Playing.to_string(),
                detail,
            });
        }

        let outcome = match handle.pump() {
            Some(pump) => pump.await_startup(
                self.clock.as_ref(),
                timing::START_TIMEOUT,
                timing::BUS_POLL_INTERVAL,
            ),
            None => StartupOutcome::TimedOut,
        };

        let verdict = match outcome {
            StartupOutcome::Playing => Ok(HandleState::Playing),
            StartupOutcome::Error(detail) => Err(PipelineError::Hardware(detail)),
            StartupOutcome::StateChangeFailed => Err(PipelineError::StateChange {
                target: MediaState::Playing.to_string(),
                detail: "state change failed during startup".into(),
            }),
            StartupOutcome::TimedOut => self.confirm_final(&handle),
        };

        let state = match verdict {
            Ok(state) => state,
            Err(e) => {
                self.teardown(handle);
                return Err(e);
            }
        };

        handle.set_state(state);
        handle.shared_status().update(|s| s.streaming = true);

        let fault = self.fault.clone();
        let monitoring = match handle.pump_mut() {
            Some(pump) => pump.start_monitoring(fault),
            None => Ok(()),
        };
        if let Err(e) = monitoring {
            self.teardown(handle);
            return Err(PipelineError::Launch(format!(
                "failed to spawn bus monitor: {e}"
            )));
        }

        Ok(handle)
    }

    /// Blocking check once the startup window has lapsed
    ///
    /// Live sources may preroll into PAUSED and only move to PLAYING once
    /// frames flow, so PAUSED with nothing pending is accepted.
    fn confirm_final(&self, handle: &PipelineHandle) -> Result<HandleState, PipelineError> {
        let query = handle.pipeline().query_state(timing::FINAL_CONFIRM_TIMEOUT);
        match (query.current, query.pending) {
            (MediaState::Playing, _) => {
                info!("Pipeline reached PLAYING after final check");
                Ok(HandleState::Playing)
            }
            (MediaState::Paused, MediaState::VoidPending) => {
                info!("Pipeline prerolled in PAUSED, accepting");
                Ok(HandleState::PausedPrerolled)
            }
            (current, pending) => {
                if current == MediaState::Paused {
                    let _ = handle.pipeline().set_state(MediaState::Null);
                    self.clock.sleep(timing::STUCK_RECOVERY_DELAY);
                }
                Err(PipelineError::Stuck {
                    current: current.to_string(),
                    pending: pending.to_string(),
                })
            }
        }
    }

    fn teardown(&self, handle: PipelineHandle) {
        let camera = handle.profile().id;
        let query = handle.release(timing::FINAL_CONFIRM_TIMEOUT);
        debug!(camera = %camera, current = %query.current, "Failed attempt torn down");
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
