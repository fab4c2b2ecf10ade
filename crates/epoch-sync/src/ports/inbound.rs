//! # Inbound Ports
//!
//! API trait defining what the epoch synchronizer offers its embedder.

use async_trait::async_trait;

/// Epoch synchronizer API - inbound port.
///
/// `start` is the only mutating operation; the queries never wait on the
/// worker.
#[async_trait]
pub trait EpochSyncApi: Send + Sync {
    /// Stop any running worker, wait for it to exit, then synchronize from
    /// `from_epoch`.
    async fn start(&self, from_epoch: u64);

    /// Whether a running worker has already moved past `epoch`.
    fn is_ahead_of(&self, epoch: u64) -> bool;

    /// Whether a worker is running.
    fn is_running(&self) -> bool;

    /// Epoch the worker is on (or stopped at).
    fn current_epoch(&self) -> u64;
}
