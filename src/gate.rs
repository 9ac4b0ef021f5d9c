//! Startup gate.
//!
//! When the cache is configured to clear itself on startup, no request may
//! read or write the cache directory until that clear has resolved. The
//! gate holds requests back while the clear runs and records how it ended.

use tokio::sync::watch;
use tracing::warn;

const SOURCE: &str = "impronta::gate";

/// Observable state of the startup gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The startup clear is still running.
    Pending,
    /// The cache directory is ready for traffic.
    Ready,
    /// The startup clear failed. Traffic proceeds against an uncleared
    /// directory; the failure stays observable here.
    Failed,
}

/// Gate that holds requests back until the startup clear resolves.
///
/// Cloning is cheap; every clone observes the same release.
#[derive(Debug, Clone)]
pub(crate) struct StartupGate {
    state: watch::Receiver<GateState>,
}

/// One-shot handle the startup clear task uses to release the gate.
#[derive(Debug)]
pub(crate) struct GateRelease {
    state: watch::Sender<GateState>,
}

impl StartupGate {
    /// Gate that is already released, for configurations without a startup
    /// clear.
    pub(crate) fn open() -> Self {
        let (_, state) = watch::channel(GateState::Ready);
        Self { state }
    }

    /// Pending gate plus the handle that releases it.
    pub(crate) fn pending() -> (Self, GateRelease) {
        let (sender, receiver) = watch::channel(GateState::Pending);
        (Self { state: receiver }, GateRelease { state: sender })
    }

    /// Current state, without waiting.
    pub(crate) fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Wait until the gate has been released and return the final state.
    ///
    /// A release handle that disappears without reporting (the clear task
    /// panicked) counts as `Failed`; waiters never hang on it.
    pub(crate) async fn released(&self) -> GateState {
        let current = self.state();
        if current != GateState::Pending {
            return current;
        }

        let mut state = self.state.clone();
        match state.wait_for(|state| *state != GateState::Pending).await {
            Ok(value) => *value,
            Err(_) => {
                warn!(
                    target: SOURCE,
                    "startup clear task vanished without reporting"
                );
                GateState::Failed
            }
        }
    }
}

impl GateRelease {
    /// Release the gate for normal traffic.
    pub(crate) fn ready(self) {
        let _ = self.state.send(GateState::Ready);
    }

    /// Release the gate while recording that the startup clear failed.
    pub(crate) fn failed(self) {
        let _ = self.state.send(GateState::Failed);
    }
}
