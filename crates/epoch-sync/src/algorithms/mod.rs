//! # Algorithms Module
//!
//! Pure building blocks of an epoch step: block cache, target root,
//! vote aggregation, record derivation.

pub mod block_cache;
pub mod records;
pub mod target_root;
pub mod vote_aggregator;

pub use block_cache::BlockCache;
pub use records::build_epoch_data;
pub use target_root::select_target_root;
pub use vote_aggregator::aggregate_epoch_votes;
