// SPDX-License-Identifier: GPL-3.0-only

//! Thread lifecycle for bus polling loops
//!
//! Each iteration of the loop body is expected to block for at most one poll
//! interval, so a stop request is observed promptly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What the loop body wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// A polling loop running on its own named thread
pub struct PollLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl PollLoop {
    /// Spawn `loop_fn` on a thread called `name`
    ///
    /// The closure runs until it returns [`LoopAction::Stop`] or
    /// [`PollLoop::stop`] is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting poll loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    if loop_fn() == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }

                debug!(name = %name_clone, "Poll loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Whether the thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for the thread
    ///
    /// Calling this from the loop's own thread only sets the signal; joining
    /// yourself would deadlock.
    pub fn stop(&mut self) {
        self.request_stop();
        let on_own_thread = self
            .thread_handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id());
        if on_own_thread {
            debug!(name = %self.name, "Stop requested from the loop thread, not joining");
            self.thread_handle.take();
            return;
        }
        self.join();
    }

    /// Wait for the thread without signalling it
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Poll loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Poll loop thread finished");
            }
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "PollLoop dropped, stopping loop");
            self.stop();
        }
    }
}
