// SPDX-License-Identifier: GPL-3.0-only

//! Foreground dispatcher
//!
//! Turns [`Command`]s into coordinator requests and forwards the resulting
//! [`Event`]s to whatever presents them. Runs on the tokio runtime; every
//! blocking hardware wait happens on the switch worker instead.

pub mod cooldown;
pub mod coordinator;

pub use cooldown::CooldownTimer;
pub use coordinator::{CooldownStatus, SwitchCoordinator, SwitchResponse, SwitchState};

use crate::backends::camera::PipelineLauncher;
use crate::backends::media_ctl;
use crate::backends::power::PowerMonitor;
use crate::clock::Clock;
use crate::config::Config;
use crate::constants::timing;
use crate::events::{Command, Event, EventSender, FaultLatch};
use crate::pipelines::preview::{ControllerOptions, PipelineController, RetryPolicy};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Transient status while a switch is in flight
pub const BUSY_STATUS: &str = "Please wait, camera is switching...";

/// Switch control label while a switch is in flight
pub const SWITCHING_LABEL: &str = "Switching...";

pub struct App {
    config: Config,
    coordinator: SwitchCoordinator,
    cooldown: CooldownTimer,
    events: EventSender,
    receiver: mpsc::UnboundedReceiver<Event>,
    flash: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(config: Config, launcher: Arc<dyn PipelineLauncher>, clock: Arc<dyn Clock>) -> Self {
        let (events, receiver) = EventSender::channel();
        let fault = FaultLatch::new(events.clone());

        let options = ControllerOptions {
            video_sink: config.video_sink.clone(),
            retry: RetryPolicy::default(),
            power: Some(PowerMonitor::new(&config.power_status_root)),
            wait_for_power_ready: config.wait_for_power_ready,
        };
        let controller = PipelineController::new(
            launcher,
            Arc::clone(&clock),
            options,
            events.clone(),
            fault.clone(),
        );
        let coordinator =
            SwitchCoordinator::new(controller, config.start_camera, clock, events.clone(), fault);
        let cooldown = CooldownTimer::new(coordinator.clone(), events.clone());

        Self {
            config,
            coordinator,
            cooldown,
            events,
            receiver,
            flash: None,
        }
    }

    pub fn coordinator(&self) -> &SwitchCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reset media links, then bring up the configured start camera
    pub async fn startup(&mut self) {
        if self.config.reset_media_links {
            match media_ctl::reset_media_links(&self.config.media_device).await {
                Ok(()) => info!(device = %self.config.media_device, "Initial media link reset successful"),
                Err(e) => warn!(error = %e, "Failed to reset media links on startup"),
            }
        }

        let response = self.coordinator.request_switch(self.config.start_camera);
        self.respond(response);
    }

    /// Handle one command; `Break` means the session should end
    pub fn dispatch(&mut self, command: Command) -> ControlFlow<()> {
        debug!(?command, "Dispatching command");
        match command {
            Command::SwitchRequested => {
                let response = self.coordinator.request_toggle();
                self.respond(response);
            }
            Command::SelectCamera(id) => {
                let response = self.coordinator.request_switch(id);
                self.respond(response);
            }
            Command::FolderOpenRequested => self.open_photos_folder(),
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn respond(&mut self, response: SwitchResponse) {
        match response {
            SwitchResponse::Accepted => self.events.button(SWITCHING_LABEL, false),
            SwitchResponse::RejectedBusy => self.flash_status(BUSY_STATUS),
            SwitchResponse::RejectedDebounced { remaining } => {
                debug!(?remaining, "Debounced, keeping cooldown alive");
                self.cooldown.start();
            }
            SwitchResponse::RejectedDisabled => debug!("Switching disabled"),
        }
    }

    /// Show `text` and clear it after the flash interval
    fn flash_status(&mut self, text: impl Into<String>) {
        if let Some(previous) = self.flash.take() {
            previous.abort();
        }
        self.events.status(text, false);

        let events = self.events.clone();
        self.flash = Some(tokio::spawn(async move {
            tokio::time::sleep(timing::STATUS_FLASH).await;
            events.status("", false);
        }));
    }

    fn open_photos_folder(&mut self) {
        let dir = self.config.photos_dir.clone();
        info!(path = %dir.display(), "Opening photos folder");

        let result = std::fs::create_dir_all(&dir).and_then(|()| open::that_detached(&dir));
        match result {
            Ok(()) => self.flash_status("Opening photos folder..."),
            Err(e) => {
                error!(error = %e, path = %dir.display(), "Failed to open photos folder");
                self.flash_status(format!("Could not open folder: {e}"));
            }
        }
    }

    /// React to an internal event; presentational events are left alone
    fn on_internal(&mut self, event: &Event) {
        if let Event::SwitchFinished { camera, started } = event {
            debug!(%camera, started, "Switch finished, starting cooldown");
            self.cooldown.start();
        }
    }

    /// Wait for the next event meant for the presentation layer
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            let event = self.receiver.recv().await?;
            if event.is_presentational() {
                return Some(event);
            }
            self.on_internal(&event);
        }
    }

    /// Run until `Quit`, Ctrl-C, or the command channel closes
    pub async fn run<F>(self, commands: mpsc::Receiver<Command>, present: F)
    where
        F: FnMut(&Event),
    {
        self.run_until(commands, present, tokio::signal::ctrl_c())
            .await;
    }

    /// Run until `Quit`, `shutdown` resolves, or the command channel closes
    pub async fn run_until<F, S>(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut present: F,
        shutdown: S,
    ) where
        F: FnMut(&Event),
        S: Future,
    {
        tokio::pin!(shutdown);
        self.startup().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.dispatch(command).is_break() {
                            info!("Quit requested");
                            break;
                        }
                    }
                    None => break,
                },
                event = self.receiver.recv() => match event {
                    Some(event) if event.is_presentational() => present(&event),
                    Some(event) => self.on_internal(&event),
                    None => break,
                },
                _ = &mut shutdown => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Wait for any in-flight switch, then release the pipeline
    pub async fn shutdown(mut self) {
        if let Some(flash) = self.flash.take() {
            flash.abort();
        }
        self.coordinator.shutdown().await;
        info!("Resources cleaned up");
    }
}
