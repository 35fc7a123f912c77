// SPDX-License-Identifier: GPL-3.0-only

//! Cooldown reporter
//!
//! Ticks on the foreground runtime after each switch and drives the switch
//! control's label until the minimum interval has passed.

use super::coordinator::{CooldownStatus, SwitchCoordinator};
use crate::constants::timing;
use crate::events::EventSender;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Label while waiting out the interval
pub fn wait_label(remaining: Duration) -> String {
    format!("Wait {}s", remaining.as_secs() + 1)
}

#[derive(Clone)]
pub struct CooldownTimer {
    running: Arc<AtomicBool>,
    coordinator: SwitchCoordinator,
    events: EventSender,
    tick_interval: Duration,
}

impl CooldownTimer {
    pub fn new(coordinator: SwitchCoordinator, events: EventSender) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            coordinator,
            events,
            tick_interval: timing::STATUS_TICK,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the ticking task on the current runtime
    ///
    /// Returns `false` when a task is already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("Starting cooldown timer");

        let timer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(timer.tick_interval);
            loop {
                interval.tick().await;
                if timer.tick().is_break() {
                    break;
                }
            }
            debug!("Cooldown timer finished");
        });
        true
    }

    /// One tick; `Break` once the timer has terminated itself
    pub fn tick(&self) -> ControlFlow<()> {
        match self.coordinator.cooldown_status() {
            CooldownStatus::Busy => ControlFlow::Continue(()),
            CooldownStatus::Waiting(remaining) => {
                self.events.button(wait_label(remaining), false);
                ControlFlow::Continue(())
            }
            CooldownStatus::Ready(current) => {
                self.events
                    .button(format!("Switch to {}", current.other().short_name()), true);
                self.finish()
            }
            CooldownStatus::Disabled => self.finish(),
        }
    }

    /// Clear the running flag, then look again
    ///
    /// A switch that completed before the flag was cleared saw the timer
    /// running and did not start one, so its countdown continues here.
    fn finish(&self) -> ControlFlow<()> {
        self.running.store(false, Ordering::SeqCst);
        let restarted = matches!(self.coordinator.cooldown_status(), CooldownStatus::Waiting(_))
            && self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        if restarted {
            debug!("Switch completed during the last tick, continuing countdown");
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_label_rounds_up() {
        assert_eq!(wait_label(Duration::from_millis(1500)), "Wait 2s");
        assert_eq!(wait_label(Duration::from_millis(100)), "Wait 1s");
        assert_eq!(wait_label(Duration::from_secs(2)), "Wait 3s");
    }
}
