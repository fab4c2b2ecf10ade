//! Stop signal shared between the orchestrator and one worker run.

use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Sending half, held by the orchestrator while the worker runs.
pub type StopSender = mpsc::Sender<()>;

/// Receiving half, owned by the worker.
///
/// A closed channel counts as a stop request.
#[derive(Debug)]
pub struct StopSignal {
    rx: mpsc::Receiver<()>,
}

impl StopSignal {
    /// Single-slot signal pair for one worker run.
    pub fn channel() -> (StopSender, StopSignal) {
        let (tx, rx) = mpsc::channel(1);
        (tx, StopSignal { rx })
    }

    /// Non-blocking check.
    pub fn is_stopped(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    /// Wait up to `timeout` for a stop request. A zero timeout yields once
    /// and polls.
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            tokio::task::yield_now().await;
            return self.is_stopped();
        }
        tokio::select! {
            _ = self.rx.recv() => true,
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}
