//! In-memory Index Store
//!
//! Implements the `SyncStore` port on top of ordered maps. Transactions stage
//! their writes and apply them under a single write lock on commit, so readers
//! never observe an epoch's records without its cursor update.

use crate::algorithms::build_epoch_data;
use crate::domain::{
    invariant_cursor_monotonic, BlockRecord, CachedBlock, EpochData, EpochRecord, EpochStats,
    EpochVotes, IndexerSyncState, SyncError, SyncResult, SYNC_STATE_KEY,
};
use crate::ports::outbound::{StoreTransaction, SyncStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    blocks: BTreeMap<u64, BlockRecord>,
    epochs: BTreeMap<u64, EpochRecord>,
    /// Explorer state: key -> JSON value.
    explorer_state: HashMap<String, String>,
}

impl StoreState {
    fn cursor(&self) -> SyncResult<Option<u64>> {
        match self.explorer_state.get(SYNC_STATE_KEY) {
            Some(raw) => {
                let state: IndexerSyncState = serde_json::from_str(raw)?;
                Ok(Some(state.epoch))
            }
            None => Ok(None),
        }
    }
}

/// In-memory store with commit fault injection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
    fail_begin: Arc<AtomicBool>,
    fail_commit: Arc<AtomicBool>,
    commits: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `begin_transaction` fail (or succeed again).
    pub fn set_fail_begin(&self, fail: bool) {
        self.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make every commit fail (or succeed again).
    pub fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Stored epoch row.
    pub fn epoch_record(&self, epoch: u64) -> Option<EpochRecord> {
        self.state.read().epochs.get(&epoch).cloned()
    }

    /// Stored slot row.
    pub fn block_record(&self, slot: u64) -> Option<BlockRecord> {
        self.state.read().blocks.get(&slot).cloned()
    }

    /// Stored slot rows of an epoch, ordered by slot.
    pub fn block_records(&self, epoch: u64) -> Vec<BlockRecord> {
        self.state
            .read()
            .blocks
            .values()
            .filter(|row| row.epoch == epoch)
            .cloned()
            .collect()
    }

    /// Number of stored epochs.
    pub fn epoch_count(&self) -> usize {
        self.state.read().epochs.len()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn is_epoch_synchronized(&self, epoch: u64) -> SyncResult<bool> {
        Ok(self.state.read().epochs.contains_key(&epoch))
    }

    async fn begin_transaction(&self) -> SyncResult<Box<dyn StoreTransaction>> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(SyncError::Storage("cannot open transaction".to_string()));
        }
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
            cursor: None,
        }))
    }

    async fn sync_cursor(&self) -> SyncResult<Option<u64>> {
        self.state.read().cursor()
    }
}

/// Staged writes of one transaction.
struct MemoryTransaction {
    store: MemoryStore,
    pending: Vec<EpochData>,
    cursor: Option<u64>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn persist_epoch_data(
        &mut self,
        _epoch: u64,
        slots_per_epoch: u64,
        blocks: &[&CachedBlock],
        stats: &EpochStats,
        votes: &EpochVotes,
    ) -> SyncResult<()> {
        self.pending
            .push(build_epoch_data(blocks, stats, votes, slots_per_epoch));
        Ok(())
    }

    async fn set_sync_cursor(&mut self, epoch: u64) -> SyncResult<()> {
        self.cursor = Some(epoch);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> SyncResult<()> {
        let MemoryTransaction {
            store,
            pending,
            cursor,
        } = *self;
        if store.fail_commit.load(Ordering::SeqCst) {
            return Err(SyncError::Storage("commit failed".to_string()));
        }

        let mut state = store.state.write();
        let cursor = match cursor {
            Some(epoch) => {
                let next = invariant_cursor_monotonic(state.cursor()?, epoch);
                Some(serde_json::to_string(&IndexerSyncState { epoch: next })?)
            }
            None => None,
        };

        for data in pending {
            debug!("[epoch-sync] committing epoch {}", data.epoch.epoch);
            for row in data.blocks {
                state.blocks.insert(row.slot, row);
            }
            state.epochs.insert(data.epoch.epoch, data.epoch);
        }
        if let Some(raw) = cursor {
            state.explorer_state.insert(SYNC_STATE_KEY.to_string(), raw);
        }
        store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockStatus, EpochAssignments, ValidatorStats};

    fn stats(epoch: u64) -> EpochStats {
        EpochStats {
            epoch,
            assignments: EpochAssignments::default(),
            validator_stats: ValidatorStats::default(),
        }
    }

    async fn write_epoch(store: &MemoryStore, epoch: u64) -> SyncResult<()> {
        let mut tx = store.begin_transaction().await?;
        tx.persist_epoch_data(epoch, 8, &[], &stats(epoch), &EpochVotes::default())
            .await?;
        tx.set_sync_cursor(epoch).await?;
        tx.commit().await
    }

    #[tokio::test]
    async fn test_commit_makes_epoch_visible() {
        let store = MemoryStore::new();
        assert!(!store.is_epoch_synchronized(3).await.unwrap());
        assert_eq!(store.sync_cursor().await.unwrap(), None);

        write_epoch(&store, 3).await.unwrap();

        assert!(store.is_epoch_synchronized(3).await.unwrap());
        assert_eq!(store.sync_cursor().await.unwrap(), Some(3));
        assert_eq!(store.block_records(3).len(), 8);
        assert_eq!(store.block_record(24).unwrap().status, BlockStatus::Missed);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin_transaction().await.unwrap();
            tx.persist_epoch_data(1, 8, &[], &stats(1), &EpochVotes::default())
                .await
                .unwrap();
            tx.set_sync_cursor(1).await.unwrap();
        }
        assert!(!store.is_epoch_synchronized(1).await.unwrap());
        assert_eq!(store.sync_cursor().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let store = MemoryStore::new();
        let mut tx = store.begin_transaction().await.unwrap();
        tx.set_sync_cursor(4).await.unwrap();
        tx.rollback();
        assert_eq!(store.sync_cursor().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let store = MemoryStore::new();
        store.set_fail_commit(true);
        assert!(write_epoch(&store, 2).await.is_err());
        assert_eq!(store.epoch_count(), 0);
        assert_eq!(store.sync_cursor().await.unwrap(), None);

        store.set_fail_commit(false);
        write_epoch(&store, 2).await.unwrap();
        assert_eq!(store.sync_cursor().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_failed_begin() {
        let store = MemoryStore::new();
        store.set_fail_begin(true);
        assert!(matches!(
            store.begin_transaction().await,
            Err(SyncError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_cursor_is_monotonic() {
        let store = MemoryStore::new();
        write_epoch(&store, 9).await.unwrap();
        write_epoch(&store, 5).await.unwrap();
        assert_eq!(store.sync_cursor().await.unwrap(), Some(9));
        assert!(store.is_epoch_synchronized(5).await.unwrap());
    }
}
