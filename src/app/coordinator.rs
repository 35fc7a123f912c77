// SPDX-License-Identifier: GPL-3.0-only

//! Switch coordinator
//!
//! Serialises camera switches. The switch lock guards the pipeline
//! controller and is only held while a stop → settle → start sequence is in
//! flight. It is only ever try-acquired: a request that finds it held is
//! rejected, never queued. An accepted request moves the lock guard into a
//! worker thread that releases it when the sequence ends.
//!
//! [`SwitchState`] sits behind its own short-lived lock so status reads and
//! debounce checks never contend with the switch lock.

use crate::clock::Clock;
use crate::constants::timing;
use crate::events::{Event, EventSender, FaultLatch};
use crate::pipelines::preview::PipelineController;
use crate::profiles::CameraId;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Status shown once startup retries are exhausted
pub fn start_failure_status(max_retries: u32) -> String {
    format!("Camera failed to start after {max_retries} retries. Try restarting the app.")
}

/// Outcome of a switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchResponse {
    Accepted,
    /// A switch is already in flight
    RejectedBusy,
    /// The previous switch finished less than the minimum interval ago
    RejectedDebounced { remaining: Duration },
    /// A terminal fault disabled switching
    RejectedDisabled,
}

/// What the cooldown reporter should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// A switch is in flight; try again next tick
    Busy,
    Disabled,
    Waiting(Duration),
    /// Interval elapsed; switching away from this camera is allowed
    Ready(CameraId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    pub current_camera: CameraId,
    pub is_switching: bool,
    pub last_switch_completed_at: Option<Instant>,
}

struct Inner {
    switch_lock: Arc<Mutex<PipelineController>>,
    state: std::sync::Mutex<SwitchState>,
    fault: FaultLatch,
    clock: Arc<dyn Clock>,
    events: EventSender,
    min_interval: Duration,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejection for `state`, if any
    fn gate(&self, state: &SwitchState) -> Option<SwitchResponse> {
        if self.fault.is_tripped() {
            return Some(SwitchResponse::RejectedDisabled);
        }
        if state.is_switching {
            return Some(SwitchResponse::RejectedBusy);
        }
        let now = self.clock.now();
        debounce_remaining(state.last_switch_completed_at, now, self.min_interval)
            .map(|remaining| SwitchResponse::RejectedDebounced { remaining })
    }
}

/// Cheap to clone; all clones share one lock
#[derive(Clone)]
pub struct SwitchCoordinator {
    inner: Arc<Inner>,
}

impl SwitchCoordinator {
    pub fn new(
        controller: PipelineController,
        initial_camera: CameraId,
        clock: Arc<dyn Clock>,
        events: EventSender,
        fault: FaultLatch,
    ) -> Self {
        Self::with_min_interval(
            controller,
            initial_camera,
            clock,
            events,
            fault,
            timing::MIN_SWITCH_INTERVAL,
        )
    }

    pub fn with_min_interval(
        controller: PipelineController,
        initial_camera: CameraId,
        clock: Arc<dyn Clock>,
        events: EventSender,
        fault: FaultLatch,
        min_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                switch_lock: Arc::new(Mutex::new(controller)),
                state: std::sync::Mutex::new(SwitchState {
                    current_camera: initial_camera,
                    is_switching: false,
                    last_switch_completed_at: None,
                }),
                fault,
                clock,
                events,
                min_interval,
            }),
        }
    }

    /// Switch to the camera that is not current
    pub fn request_toggle(&self) -> SwitchResponse {
        self.request(CameraId::other)
    }

    /// Switch to `target`
    ///
    /// Requesting the current camera restarts its pipeline.
    pub fn request_switch(&self, target: CameraId) -> SwitchResponse {
        self.request(|_| target)
    }

    fn request(&self, pick_target: impl FnOnce(CameraId) -> CameraId) -> SwitchResponse {
        let snapshot = *self.inner.lock_state();
        if let Some(rejection) = self.inner.gate(&snapshot) {
            log_rejection(rejection);
            return rejection;
        }

        let Ok(controller) = Arc::clone(&self.inner.switch_lock).try_lock_owned() else {
            debug!("Switch ignored, already in progress");
            return SwitchResponse::RejectedBusy;
        };

        let (from, target) = {
            let mut state = self.inner.lock_state();
            // Another switch may have completed since the snapshot
            if let Some(rejection) = self.inner.gate(&state) {
                log_rejection(rejection);
                return rejection;
            }
            state.is_switching = true;
            (state.current_camera, pick_target(state.current_camera))
        };

        info!(%from, to = %target, "Initiating camera switch");

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("camera-switch".into())
            .spawn(move || run_switch(inner, controller, target));

        match spawned {
            Ok(_) => SwitchResponse::Accepted,
            Err(e) => {
                // The guard went down with the closure, so the lock is free again
                error!(error = %e, "Failed to spawn switch worker");
                self.inner.lock_state().is_switching = false;
                SwitchResponse::RejectedBusy
            }
        }
    }

    /// Snapshot for the cooldown reporter; never touches the switch lock
    pub fn cooldown_status(&self) -> CooldownStatus {
        if self.inner.fault.is_tripped() {
            return CooldownStatus::Disabled;
        }
        let state = *self.inner.lock_state();
        if state.is_switching {
            return CooldownStatus::Busy;
        }
        let now = self.inner.clock.now();
        match debounce_remaining(state.last_switch_completed_at, now, self.inner.min_interval) {
            Some(remaining) => CooldownStatus::Waiting(remaining),
            None => CooldownStatus::Ready(state.current_camera),
        }
    }

    pub fn state(&self) -> SwitchState {
        *self.inner.lock_state()
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.fault.is_tripped()
    }

    pub fn fault(&self) -> &FaultLatch {
        &self.inner.fault
    }

    /// Wait for any in-flight switch, then release the pipeline
    pub async fn shutdown(&self) {
        let mut controller = Arc::clone(&self.inner.switch_lock).lock_owned().await;
        info!("Releasing camera for shutdown");
        let released = tokio::task::spawn_blocking(move || {
            controller.shutdown();
        })
        .await;
        if let Err(e) = released {
            warn!(error = %e, "Shutdown task failed");
        }
    }
}

fn log_rejection(rejection: SwitchResponse) {
    match rejection {
        SwitchResponse::RejectedDebounced { remaining } => {
            info!(?remaining, "Camera switch too fast");
        }
        SwitchResponse::RejectedBusy => debug!("Switch ignored, already in progress"),
        SwitchResponse::RejectedDisabled => debug!("Switching disabled"),
        SwitchResponse::Accepted => {}
    }
}

/// Releases the switch lock and reports completion when the worker ends,
/// including by unwinding
struct SwitchCompletion {
    inner: Arc<Inner>,
    target: CameraId,
    max_retries: u32,
    started: bool,
    controller: Option<OwnedMutexGuard<PipelineController>>,
}

impl Drop for SwitchCompletion {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(camera = %self.target, "Switch worker panicked");
            self.inner.fault.trip(start_failure_status(self.max_retries));
        }
        drop(self.controller.take());

        {
            let mut state = self.inner.lock_state();
            if self.started {
                state.current_camera = self.target;
            }
            state.is_switching = false;
            state.last_switch_completed_at = Some(self.inner.clock.now());
        }

        info!(camera = %self.target, started = self.started, "Camera switch completed, lock released");
        self.inner.events.send(Event::SwitchFinished {
            camera: self.target,
            started: self.started,
        });
    }
}

/// Worker body; owns the switch lock for its whole duration
fn run_switch(inner: Arc<Inner>, controller: OwnedMutexGuard<PipelineController>, target: CameraId) {
    let mut completion = SwitchCompletion {
        max_retries: controller.retry_policy().max_retries,
        inner,
        target,
        started: false,
        controller: Some(controller),
    };
    let Some(controller) = completion.controller.as_mut() else {
        return;
    };

    controller.stop();
    match controller.start(target.profile()) {
        Ok(()) => completion.started = true,
        Err(failure) => {
            error!(error = %failure, "Camera start failed");
            completion
                .inner
                .fault
                .trip(start_failure_status(completion.max_retries));
        }
    }
}

/// Time left before another switch is allowed, `None` when allowed now
pub fn debounce_remaining(
    last_completed: Option<Instant>,
    now: Instant,
    min_interval: Duration,
) -> Option<Duration> {
    let last = last_completed?;
    let since = now.saturating_duration_since(last);
    min_interval.checked_sub(since).filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_remaining() {
        let t0 = Instant::now();
        let min = Duration::from_secs(2);

        assert_eq!(debounce_remaining(None, t0, min), None);
        assert_eq!(
            debounce_remaining(Some(t0), t0 + Duration::from_millis(500), min),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(debounce_remaining(Some(t0), t0 + min, min), None);
        assert_eq!(
            debounce_remaining(Some(t0), t0 + Duration::from_millis(2100), min),
            None
        );
    }

    #[test]
    fn test_start_failure_status() {
        assert_eq!(
            start_failure_status(2),
            "Camera failed to start after 2 retries. Try restarting the app."
        );
    }
}
