// SPDX-License-Identifier: GPL-3.0-only

//! Command/event contract between the core and any presentation layer
//!
//! Workers never touch presentation state. Everything they want shown is
//! queued as an [`Event`] and delivered on the foreground context.

use crate::profiles::CameraId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Inbound requests from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle to the camera that is not currently active
    SwitchRequested,
    /// Switch to a specific camera
    SelectCamera(CameraId),
    /// Open the photos folder in the desktop file manager
    FolderOpenRequested,
    /// End the session and release the hardware
    Quit,
}

/// Outbound notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Overlay text; `busy` shows a spinner. Empty text hides the overlay.
    StatusChanged { text: String, busy: bool },
    /// Switch control label and sensitivity
    ButtonState { label: String, enabled: bool },
    /// A stop/settle/start sequence finished and the switch lock is free
    SwitchFinished { camera: CameraId, started: bool },
}

impl Event {
    pub fn status(text: impl Into<String>, busy: bool) -> Self {
        Event::StatusChanged {
            text: text.into(),
            busy,
        }
    }

    pub fn button(label: impl Into<String>, enabled: bool) -> Self {
        Event::ButtonState {
            label: label.into(),
            enabled,
        }
    }

    /// Whether this event is meant for the presentation layer
    pub fn is_presentational(&self) -> bool {
        !matches!(self, Event::SwitchFinished { .. })
    }
}

/// Thread-safe queue to the foreground context
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<Event>);

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Queue an event; a closed receiver means the session is ending
    pub fn send(&self, event: Event) {
        if let Err(e) = self.0.send(event) {
            debug!(event = ?e.0, "Event receiver gone, dropping event");
        }
    }

    pub fn status(&self, text: impl Into<String>, busy: bool) {
        self.send(Event::status(text, busy));
    }

    pub fn button(&self, label: impl Into<String>, enabled: bool) {
        self.send(Event::button(label, enabled));
    }
}

/// Label shown on the switch control once switching is disabled for good
pub const UNAVAILABLE_LABEL: &str = "Camera unavailable";

/// One-shot latch for terminal faults
///
/// Both a start failure and a steady-state hardware error end up here. The
/// first trip disables switching and emits one status and one button
/// update; later trips are silent.
#[derive(Debug, Clone)]
pub struct FaultLatch {
    tripped: Arc<AtomicBool>,
    events: EventSender,
}

impl FaultLatch {
    pub fn new(events: EventSender) -> Self {
        Self {
            tripped: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Disable switching for the rest of the process lifetime
    ///
    /// Returns `true` for the trip that actually changed state.
    pub fn trip(&self, status: impl Into<String>) -> bool {
        if self.tripped.swap(true, Ordering::SeqCst) {
            debug!("Fault latch already tripped");
            return false;
        }
        let status = status.into();
        error!(status = %status, "Camera switching disabled until restart");
        self.events.status(status, false);
        self.events.button(UNAVAILABLE_LABEL, false);
        true
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_latch_emits_once() {
        let (events, mut rx) = EventSender::channel();
        let latch = FaultLatch::new(events);

        assert!(latch.trip("first"));
        assert!(!latch.trip("second"));
        assert!(latch.is_tripped());

        assert_eq!(rx.try_recv().ok(), Some(Event::status("first", false)));
        assert_eq!(
            rx.try_recv().ok(),
            Some(Event::button(UNAVAILABLE_LABEL, false))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (events, rx) = EventSender::channel();
        drop(rx);
        events.status("nobody listening", false);
    }
}
