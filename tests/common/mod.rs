// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures: a manual clock and a scripted pipeline launcher

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};
use surface_camera::app::SwitchCoordinator;
use surface_camera::backends::camera::{
    BusEvent, MediaPipeline, MediaState, PipelineDescription, PipelineLauncher, StateChange,
    StateChangeFailed, StateQuery,
};
use surface_camera::errors::PipelineError;
use surface_camera::pipelines::preview::{ControllerOptions, PipelineController};
use surface_camera::{CameraId, Clock, Event, EventSender, FaultLatch};
use tokio::sync::mpsc::UnboundedReceiver;

/// Clock whose `sleep` returns immediately after advancing time
pub struct ManualClock {
    inner: Mutex<ClockState>,
}

struct ClockState {
    now: Instant,
    sleeps: Vec<Duration>,
    rewind_after_read: Option<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ClockState {
                now: Instant::now(),
                sleeps: Vec::new(),
                rewind_after_read: None,
            }),
        })
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.inner.lock().unwrap().now += duration;
    }

    /// Move time back by `duration` right after the next `now` call
    ///
    /// Makes a later read look as if a switch had just completed.
    pub fn rewind_after_next_read(&self, duration: Duration) {
        self.inner.lock().unwrap().rewind_after_read = Some(duration);
    }

    /// Every `sleep` call so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().sleeps.clone()
    }

    /// Sleeps of at least `min`, which filters out short drain delays
    pub fn sleeps_at_least(&self, min: Duration) -> Vec<Duration> {
        self.sleeps().into_iter().filter(|d| *d >= min).collect()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut state = self.inner.lock().unwrap();
        let now = state.now;
        if let Some(rewind) = state.rewind_after_read.take() {
            state.now = now.checked_sub(rewind).unwrap_or(now);
        }
        now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// How a launched fake pipeline behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Reaches PLAYING immediately
    Starts,
    /// `set_state(PLAYING)` fails, optionally leaving an error on the bus
    RejectsPlaying(Option<String>),
    /// Posts an error while transitioning
    BusError(String),
    /// Settles in PAUSED with nothing pending
    Prerolls,
    /// Stays in PAUSED with PLAYING pending
    Stuck,
    /// Starts fine but never confirms NULL
    StopTimesOut,
    /// The launcher itself panics
    PanicsOnLaunch,
}

struct Shared {
    clock: Arc<ManualClock>,
    journal: Mutex<Vec<String>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl Shared {
    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }
}

struct PipeState {
    current: MediaState,
    pending: MediaState,
    queue: VecDeque<BusEvent>,
    listening: bool,
    /// Startup window: empty polls advance the manual clock
    starting: bool,
}

impl PipeState {
    fn post(&mut self, event: BusEvent) {
        if self.listening {
            self.queue.push_back(event);
        }
    }
}

pub struct FakePipeline {
    id: usize,
    behavior: Behavior,
    description: String,
    shared: Arc<Shared>,
    state: Mutex<PipeState>,
}

fn error_event(message: &str) -> BusEvent {
    BusEvent::Error {
        source: "libcamerasrc0".into(),
        message: message.into(),
        debug: None,
    }
}

impl FakePipeline {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Post a bus message as the driver would; dropped when nobody listens
    pub fn inject(&self, event: BusEvent) {
        self.state.lock().unwrap().post(event);
    }

    pub fn inject_error(&self, message: &str) {
        self.inject(error_event(message));
    }

    pub fn is_listening(&self) -> bool {
        self.state.lock().unwrap().listening
    }

    pub fn current_state(&self) -> MediaState {
        self.state.lock().unwrap().current
    }
}

impl MediaPipeline for FakePipeline {
    fn description(&self) -> &str {
        &self.description
    }

    fn set_state(&self, target: MediaState) -> Result<StateChange, StateChangeFailed> {
        self.shared
            .record(format!("set_state:{}:{}", self.id, target));
        let mut st = self.state.lock().unwrap();

        match target {
            MediaState::Playing => match &self.behavior {
                Behavior::Starts | Behavior::StopTimesOut | Behavior::PanicsOnLaunch => {
                    let old = st.current;
                    st.current = MediaState::Playing;
                    st.pending = MediaState::VoidPending;
                    st.post(BusEvent::StateChanged {
                        from_pipeline: true,
                        old,
                        current: MediaState::Playing,
                        pending: MediaState::VoidPending,
                    });
                    Ok(StateChange::Async)
                }
                Behavior::RejectsPlaying(message) => {
                    if let Some(message) = message {
                        st.post(error_event(message));
                    }
                    Err(StateChangeFailed)
                }
                Behavior::BusError(message) => {
                    st.current = MediaState::Ready;
                    st.pending = MediaState::Playing;
                    st.starting = true;
                    st.post(error_event(message));
                    Ok(StateChange::Async)
                }
                Behavior::Prerolls => {
                    st.current = MediaState::Paused;
                    st.pending = MediaState::VoidPending;
                    st.starting = true;
                    Ok(StateChange::Async)
                }
                Behavior::Stuck => {
                    st.current = MediaState::Paused;
                    st.pending = MediaState::Playing;
                    st.starting = true;
                    Ok(StateChange::Async)
                }
            },
            MediaState::Null => {
                st.starting = false;
                if self.behavior == Behavior::StopTimesOut {
                    st.pending = MediaState::Null;
                } else {
                    st.current = MediaState::Null;
                    st.pending = MediaState::VoidPending;
                }
                Ok(StateChange::Success)
            }
            other => {
                st.current = other;
                st.pending = MediaState::VoidPending;
                Ok(StateChange::Success)
            }
        }
    }

    fn query_state(&self, timeout: Duration) -> StateQuery {
        let mut st = self.state.lock().unwrap();
        let blocking = !timeout.is_zero();
        if blocking {
            st.starting = false;
        }
        let query = StateQuery {
            result: if st.pending == MediaState::VoidPending {
                Ok(StateChange::Success)
            } else {
                Ok(StateChange::Async)
            },
            current: st.current,
            pending: st.pending,
        };
        let unsettled = st.pending != MediaState::VoidPending;
        drop(st);

        if blocking && unsettled {
            self.shared.clock.advance(timeout);
        }
        query
    }

    fn poll_event(&self, timeout: Duration) -> Option<BusEvent> {
        let mut st = self.state.lock().unwrap();
        if let Some(event) = st.queue.pop_front() {
            return Some(event);
        }
        let starting = st.starting;
        drop(st);

        if starting {
            self.shared.clock.advance(timeout);
        } else {
            thread::sleep(Duration::from_millis(2));
        }
        None
    }

    fn drain_events(&self) -> Vec<BusEvent> {
        self.state.lock().unwrap().queue.drain(..).collect()
    }

    fn attach_listener(&self) {
        self.shared.record(format!("attach:{}", self.id));
        self.state.lock().unwrap().listening = true;
    }

    fn detach_listener(&self) {
        self.shared.record(format!("detach:{}", self.id));
        let mut st = self.state.lock().unwrap();
        st.listening = false;
        st.queue.clear();
    }
}

impl Drop for FakePipeline {
    fn drop(&mut self) {
        self.shared.record(format!("dropped:{}", self.id));
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Launcher handing out scripted [`FakePipeline`]s
pub struct FakeLauncher {
    shared: Arc<Shared>,
    scripts: Mutex<VecDeque<Behavior>>,
    launched: Mutex<Vec<Weak<FakePipeline>>>,
    descriptions: Mutex<Vec<String>>,
    gate: (Mutex<bool>, Condvar),
}

impl FakeLauncher {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                clock,
                journal: Mutex::new(Vec::new()),
                live: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
            }),
            scripts: Mutex::new(VecDeque::new()),
            launched: Mutex::new(Vec::new()),
            descriptions: Mutex::new(Vec::new()),
            gate: (Mutex::new(false), Condvar::new()),
        })
    }

    /// Queue behaviours for the next launches; later launches just start
    pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.scripts.lock().unwrap().extend(behaviors);
    }

    /// Block launches until [`FakeLauncher::release`]
    pub fn hold(&self) {
        *self.gate.0.lock().unwrap() = true;
    }

    pub fn release(&self) {
        *self.gate.0.lock().unwrap() = false;
        self.gate.1.notify_all();
    }

    pub fn journal(&self) -> Vec<String> {
        self.shared.journal.lock().unwrap().clone()
    }

    /// Position of `entry` in the journal
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.journal().iter().position(|e| e == entry)
    }

    pub fn launches(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.descriptions.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    /// The most recent pipeline, if it is still alive
    pub fn last_pipeline(&self) -> Option<Arc<FakePipeline>> {
        self.launched.lock().unwrap().last().and_then(Weak::upgrade)
    }
}

impl PipelineLauncher for FakeLauncher {
    fn launch(
        &self,
        description: &PipelineDescription,
    ) -> Result<Arc<dyn MediaPipeline>, PipelineError> {
        {
            let (lock, cvar) = &self.gate;
            let mut held = lock.lock().unwrap();
            while *held {
                held = cvar.wait(held).unwrap();
            }
        }

        let behavior = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Behavior::Starts);
        if behavior == Behavior::PanicsOnLaunch {
            panic!("launcher failed to build {description}");
        }
        let mut launched = self.launched.lock().unwrap();
        let id = launched.len() + 1;

        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);
        self.shared.record(format!("launch:{id}"));
        self.descriptions
            .lock()
            .unwrap()
            .push(description.to_string());

        let pipeline = Arc::new(FakePipeline {
            id,
            behavior,
            description: description.to_string(),
            shared: Arc::clone(&self.shared),
            state: Mutex::new(PipeState {
                current: MediaState::Null,
                pending: MediaState::VoidPending,
                queue: VecDeque::new(),
                listening: false,
                starting: false,
            }),
        });
        launched.push(Arc::downgrade(&pipeline));
        Ok(pipeline)
    }
}

pub struct ControllerFixture {
    pub clock: Arc<ManualClock>,
    pub launcher: Arc<FakeLauncher>,
    pub controller: PipelineController,
    pub fault: FaultLatch,
    pub events: UnboundedReceiver<Event>,
}

pub fn controller_fixture() -> ControllerFixture {
    controller_fixture_with(ControllerOptions::default())
}

pub fn controller_fixture_with(options: ControllerOptions) -> ControllerFixture {
    let clock = ManualClock::new();
    let launcher = FakeLauncher::new(Arc::clone(&clock));
    let (sender, events) = EventSender::channel();
    let fault = FaultLatch::new(sender.clone());
    let controller = PipelineController::new(
        launcher.clone(),
        clock.clone(),
        options,
        sender,
        fault.clone(),
    );
    ControllerFixture {
        clock,
        launcher,
        controller,
        fault,
        events,
    }
}

pub struct CoordinatorFixture {
    pub clock: Arc<ManualClock>,
    pub launcher: Arc<FakeLauncher>,
    pub coordinator: SwitchCoordinator,
    pub sender: EventSender,
    pub events: UnboundedReceiver<Event>,
}

pub fn coordinator_fixture() -> CoordinatorFixture {
    let clock = ManualClock::new();
    let launcher = FakeLauncher::new(Arc::clone(&clock));
    let (sender, events) = EventSender::channel();
    let fault = FaultLatch::new(sender.clone());
    let controller = PipelineController::new(
        launcher.clone(),
        clock.clone(),
        ControllerOptions::default(),
        sender.clone(),
        fault.clone(),
    );
    let coordinator =
        SwitchCoordinator::new(controller, CameraId::Front, clock.clone(), sender.clone(), fault);
    CoordinatorFixture {
        clock,
        launcher,
        coordinator,
        sender,
        events,
    }
}

/// Collect events until one matches `done`; panics after five real seconds
pub fn collect_until(
    events: &mut UnboundedReceiver<Event>,
    done: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(_) => {
                assert!(
                    Instant::now() < deadline,
                    "timed out waiting for event, saw {seen:?}"
                );
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

/// Collect events up to and including the next `SwitchFinished`
pub fn wait_switch_finished(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    collect_until(events, |e| matches!(e, Event::SwitchFinished { .. }))
}

/// Everything queued right now
pub fn drain(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Poll `condition` for up to five real seconds
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}
