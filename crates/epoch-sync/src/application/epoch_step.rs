//! # Epoch Step
//!
//! One epoch's unit of work: fetch duties, extend the block cache over the
//! epoch and its lookahead, fetch the validator snapshot, aggregate votes and
//! persist everything in a single transaction.
//!
//! A failed step leaves storage untouched and the cache reusable: slots
//! already fetched stay cached and are not requested again on retry.

use std::sync::Arc;
use tracing::debug;

use super::cancel::StopSignal;
use crate::algorithms::{aggregate_epoch_votes, select_target_root, BlockCache};
use crate::config::SyncConfig;
use crate::domain::{
    CachedBlock, EpochOutcome, EpochRange, EpochStats, EpochVotes, SyncError, SyncResult,
    LOOKAHEAD_EPOCHS,
};
use crate::ports::outbound::{BeaconNodeClient, SyncStore};

/// Runs epoch steps against a chain node and a store, owning the block cache.
pub struct EpochProcessor {
    config: SyncConfig,
    client: Arc<dyn BeaconNodeClient>,
    store: Arc<dyn SyncStore>,
    cache: BlockCache,
}

impl EpochProcessor {
    /// Create a processor with an empty cache.
    pub fn new(
        config: SyncConfig,
        client: Arc<dyn BeaconNodeClient>,
        store: Arc<dyn SyncStore>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            cache: BlockCache::new(),
        }
    }

    /// The block cache.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Synchronize `epoch`.
    ///
    /// Returns `AlreadySynced` without fetching when storage has the epoch,
    /// `Cancelled` when `stop` fired before the persist, `Synced` after a
    /// successful commit. Errors leave no partial writes behind; an epoch
    /// whose slots overflow a slot number fails with `EpochOutOfRange`
    /// before any request.
    pub async fn sync_epoch(
        &mut self,
        epoch: u64,
        stop: &mut StopSignal,
    ) -> SyncResult<EpochOutcome> {
        let slots_per_epoch = self.config.slots_per_epoch;
        let window = EpochRange::checked_with_lookahead(epoch, LOOKAHEAD_EPOCHS, slots_per_epoch)
            .ok_or(SyncError::EpochOutOfRange { epoch })?;
        let epoch_range = EpochRange::of(epoch, slots_per_epoch);

        if self.store.is_epoch_synchronized(epoch).await? {
            self.cache.evict_through(epoch_range.last_slot);
            return Ok(EpochOutcome::AlreadySynced);
        }

        let assignments = self
            .client
            .get_epoch_assignments(epoch)
            .await
            .map_err(|e| SyncError::AssignmentsFetch {
                epoch,
                reason: e.to_string(),
            })?
            .ok_or(SyncError::MissingAssignments { epoch })?;

        for slot in window.slots() {
            if self.cache.is_fetched(slot) {
                continue;
            }
            if stop.is_stopped() {
                return Ok(EpochOutcome::Cancelled);
            }
            self.fetch_slot(slot).await?;
        }

        if stop.is_stopped() {
            return Ok(EpochOutcome::Cancelled);
        }

        let validator_stats = self
            .client
            .get_validator_stats(&assignments.dependent_state_root)
            .await
            .ok_or(SyncError::MissingValidatorStats { epoch })?;
        let stats = EpochStats {
            epoch,
            assignments,
            validator_stats,
        };

        if stop.is_stopped() {
            return Ok(EpochOutcome::Cancelled);
        }

        let target_root = select_target_root(&self.cache, epoch_range);
        let window_blocks: Vec<&CachedBlock> = self.cache.range(window).collect();
        let votes = aggregate_epoch_votes(&window_blocks, &stats, target_root, slots_per_epoch);
        let epoch_blocks: Vec<&CachedBlock> = self.cache.range(epoch_range).collect();

        self.persist(epoch, &epoch_blocks, &stats, &votes).await?;

        let evicted = self.cache.evict_through(epoch_range.last_slot);
        debug!(
            epoch,
            evicted,
            cached = self.cache.len(),
            target_root = %target_root.map(hex::encode).unwrap_or_default(),
            "[epoch-sync] epoch persisted"
        );
        Ok(EpochOutcome::Synced)
    }

    /// Look up one slot and cache its block if there is one.
    async fn fetch_slot(&mut self, slot: u64) -> SyncResult<()> {
        let header = self
            .client
            .get_block_header_by_slot(slot)
            .await
            .map_err(|e| SyncError::HeaderFetch {
                slot,
                reason: e.to_string(),
            })?;

        match header {
            None => self.cache.mark_fetched(slot),
            Some(response) => {
                let body = self
                    .client
                    .get_block_body_by_root(&response.root)
                    .await
                    .map_err(|e| SyncError::BodyFetch {
                        slot,
                        reason: e.to_string(),
                    })?;
                self.cache.insert(CachedBlock::new(response, body));
            }
        }
        Ok(())
    }

    /// Write the epoch's records and the cursor in one transaction.
    async fn persist(
        &self,
        epoch: u64,
        blocks: &[&CachedBlock],
        stats: &EpochStats,
        votes: &EpochVotes,
    ) -> SyncResult<()> {
        let mut tx = self.store.begin_transaction().await?;

        let staged = match tx
            .persist_epoch_data(epoch, self.config.slots_per_epoch, blocks, stats, votes)
            .await
        {
            Ok(()) => tx.set_sync_cursor(epoch).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            tx.rollback();
            return Err(e);
        }

        tx.commit().await
    }
}
