//! Operator signals for a running session
//!
//! Two signals exist: *quit* ends the session after the current step, and
//! *stop recording* ends the capture in progress early. Both are `watch`
//! channels, so the session loop and the capture step wait on them instead
//! of polling key state.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle used by the operator side and the orchestrator
#[derive(Debug, Clone)]
pub struct SessionControl {
    quit: Arc<watch::Sender<bool>>,
    stop: Arc<watch::Sender<u64>>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    #[must_use]
    pub fn new() -> Self {
        let (quit, _) = watch::channel(false);
        let (stop, _) = watch::channel(0);
        Self {
            quit: Arc::new(quit),
            stop: Arc::new(stop),
        }
    }

    /// Request the session to end
    pub fn quit(&self) {
        if !self.quit.send_replace(true) {
            tracing::info!("quit requested");
        }
    }

    /// Whether quit has been requested
    #[must_use]
    pub fn is_quit(&self) -> bool {
        *self.quit.borrow()
    }

    /// Resolve once quit has been requested
    pub async fn quit_requested(&self) {
        let mut rx = self.quit.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// End the recording in progress, if any
    ///
    /// A stop issued while nothing is recording does not affect the next
    /// recording.
    pub fn stop_recording(&self) {
        self.stop.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Signal handed to one capture; fires on stop-recording or quit
    #[must_use]
    pub fn capture_stop(&self) -> CaptureStop {
        CaptureStop {
            stop: self.stop.subscribe(),
            quit: self.quit.subscribe(),
        }
    }
}

/// Early-stop signal for a single capture
#[derive(Debug)]
pub struct CaptureStop {
    stop: watch::Receiver<u64>,
    quit: watch::Receiver<bool>,
}

impl CaptureStop {
    /// Resolve when the operator stops the recording or quits
    pub async fn triggered(&mut self) {
        if *self.quit.borrow() {
            return;
        }
        // Quit only ever flips false -> true, so any change means quit
        tokio::select! {
            Ok(()) = self.stop.changed() => {}
            Ok(()) = self.quit.changed() => {}
            else => std::future::pending::<()>().await,
        }
    }
}
