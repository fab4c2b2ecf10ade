//! # Epoch Sync
//!
//! Epoch synchronization engine for a beacon-chain indexer.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Walk epochs forward from a start epoch to the finalized head. For each
//! epoch:
//! - fetch proposer/attester/sync duties
//! - fetch the blocks of the epoch and one epoch of lookahead into a
//!   slot-keyed cache
//! - aggregate attestation votes weighted by effective balance
//! - persist the derived records and the sync cursor in one transaction
//!
//! ## Guarantees
//!
//! | Property | Description |
//! |----------|-------------|
//! | Single worker | At most one background worker runs at any time |
//! | Idempotent | A stored epoch is skipped without network traffic |
//! | Atomic | Records and cursor commit together or not at all |
//! | Fetch once | A cached or empty slot is never requested twice in a run |
//!
//! ## Module Structure
//!
//! ```text
//! epoch-sync/
//! ├── domain/          # Chain types, records, errors, invariants
//! ├── algorithms/      # Block cache, target root, vote aggregation, records
//! ├── ports/           # API trait (inbound) + node/store/finality traits (outbound)
//! ├── adapters/        # In-memory and RocksDB stores
//! ├── application/     # EpochProcessor and EpochSynchronizer
//! └── config.rs        # SyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbStore, RocksDbStoreConfig};
pub use adapters::MemoryStore;
pub use algorithms::{aggregate_epoch_votes, build_epoch_data, select_target_root, BlockCache};
pub use application::{EpochProcessor, EpochSynchronizer, StopSignal};
pub use config::SyncConfig;
pub use domain::{
    BlockRecord, BlockStatus, CachedBlock, EpochAssignments, EpochOutcome, EpochRange,
    EpochRecord, EpochStats, EpochVotes, IndexerSyncState, Root, SyncError, SyncResult,
    ValidatorStats, VoteTally, LOOKAHEAD_EPOCHS, SYNC_STATE_KEY,
};
pub use ports::{
    BeaconNodeClient, EpochSyncApi, FinalityOracle, MockBeaconNode, MockFinalityOracle,
    StoreTransaction, SyncStore,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
