//! # RocksDB Index Store
//!
//! Persistent implementation of the `SyncStore` port.
//!
//! ## Column Families
//!
//! - `blocks` - slot rows, keyed by big-endian slot
//! - `epochs` - epoch rows, keyed by big-endian epoch
//! - `state` - explorer state (JSON), keyed by name
//!
//! A transaction is one `WriteBatch`; nothing reaches the database before
//! `commit`, and dropping the batch discards it.

use crate::algorithms::build_epoch_data;
use crate::domain::{
    invariant_cursor_monotonic, BlockRecord, CachedBlock, EpochRecord, EpochStats, EpochVotes,
    IndexerSyncState, SyncError, SyncResult, SYNC_STATE_KEY,
};
use crate::ports::outbound::{StoreTransaction, SyncStore};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, WriteOptions, DB};
use std::sync::Arc;

/// Slot rows.
pub const CF_BLOCKS: &str = "blocks";
/// Epoch rows.
pub const CF_EPOCHS: &str = "epochs";
/// Explorer state.
pub const CF_STATE: &str = "state";

/// All column families used by the store.
pub const COLUMN_FAMILIES: &[&str] = &[CF_BLOCKS, CF_EPOCHS, CF_STATE];

/// RocksDB store configuration.
#[derive(Debug, Clone)]
pub struct RocksDbStoreConfig {
    /// Path to the database directory.
    pub path: String,
    /// fsync every committed batch.
    pub sync_writes: bool,
}

impl Default for RocksDbStoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/index".to_string(),
            sync_writes: true,
        }
    }
}

impl RocksDbStoreConfig {
    /// Create config for testing (no fsync).
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
        }
    }
}

fn storage_err(context: &str, err: rocksdb::Error) -> SyncError {
    SyncError::Storage(format!("{}: {}", context, err))
}

/// RocksDB-backed index store.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    config: RocksDbStoreConfig,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbStoreConfig) -> SyncResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| storage_err("failed to open RocksDB", e))?;

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    fn cf(&self, name: &str) -> SyncResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SyncError::Storage(format!("missing column family {}", name)))
    }

    fn read_cursor(&self) -> SyncResult<Option<u64>> {
        let raw = self
            .db
            .get_cf(self.cf(CF_STATE)?, SYNC_STATE_KEY.as_bytes())
            .map_err(|e| storage_err("RocksDB get failed", e))?;
        match raw {
            Some(raw) => {
                let state: IndexerSyncState = serde_json::from_slice(&raw)?;
                Ok(Some(state.epoch))
            }
            None => Ok(None),
        }
    }

    /// Stored epoch row.
    pub fn epoch_record(&self, epoch: u64) -> SyncResult<Option<EpochRecord>> {
        let raw = self
            .db
            .get_cf(self.cf(CF_EPOCHS)?, epoch.to_be_bytes())
            .map_err(|e| storage_err("RocksDB get failed", e))?;
        raw.map(|raw| bincode::deserialize(&raw).map_err(SyncError::from))
            .transpose()
    }

    /// Stored slot row.
    pub fn block_record(&self, slot: u64) -> SyncResult<Option<BlockRecord>> {
        let raw = self
            .db
            .get_cf(self.cf(CF_BLOCKS)?, slot.to_be_bytes())
            .map_err(|e| storage_err("RocksDB get failed", e))?;
        raw.map(|raw| bincode::deserialize(&raw).map_err(SyncError::from))
            .transpose()
    }
}

#[async_trait]
impl SyncStore for RocksDbStore {
    async fn is_epoch_synchronized(&self, epoch: u64) -> SyncResult<bool> {
        let raw = self
            .db
            .get_pinned_cf(self.cf(CF_EPOCHS)?, epoch.to_be_bytes())
            .map_err(|e| storage_err("RocksDB get failed", e))?;
        Ok(raw.is_some())
    }

    async fn begin_transaction(&self) -> SyncResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(RocksDbTransaction {
            store: self.clone(),
            batch: WriteBatch::default(),
        }))
    }

    async fn sync_cursor(&self) -> SyncResult<Option<u64>> {
        self.read_cursor()
    }
}

/// One `WriteBatch` worth of staged writes.
struct RocksDbTransaction {
    store: RocksDbStore,
    batch: WriteBatch,
}

#[async_trait]
impl StoreTransaction for RocksDbTransaction {
    async fn persist_epoch_data(
        &mut self,
        _epoch: u64,
        slots_per_epoch: u64,
        blocks: &[&CachedBlock],
        stats: &EpochStats,
        votes: &EpochVotes,
    ) -> SyncResult<()> {
        let data = build_epoch_data(blocks, stats, votes, slots_per_epoch);

        let blocks_cf = self.store.cf(CF_BLOCKS)?;
        for row in &data.blocks {
            self.batch
                .put_cf(blocks_cf, row.slot.to_be_bytes(), bincode::serialize(row)?);
        }
        let epochs_cf = self.store.cf(CF_EPOCHS)?;
        self.batch.put_cf(
            epochs_cf,
            data.epoch.epoch.to_be_bytes(),
            bincode::serialize(&data.epoch)?,
        );
        Ok(())
    }

    async fn set_sync_cursor(&mut self, epoch: u64) -> SyncResult<()> {
        let next = invariant_cursor_monotonic(self.store.read_cursor()?, epoch);
        let raw = serde_json::to_vec(&IndexerSyncState { epoch: next })?;
        let state_cf = self.store.cf(CF_STATE)?;
        self.batch.put_cf(state_cf, SYNC_STATE_KEY.as_bytes(), raw);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> SyncResult<()> {
        let RocksDbTransaction { store, batch } = *self;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(store.config.sync_writes);
        store
            .db
            .write_opt(batch, &write_opts)
            .map_err(|e| storage_err("RocksDB batch write failed", e))
    }
}
