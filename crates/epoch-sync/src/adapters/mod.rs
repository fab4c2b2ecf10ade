//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the `SyncStore` port.

mod memory_store;
#[cfg(feature = "rocksdb")]
mod rocksdb_store;

pub use memory_store::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbStore, RocksDbStoreConfig};
