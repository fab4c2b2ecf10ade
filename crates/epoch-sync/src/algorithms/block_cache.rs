//! # Block Cache
//!
//! Sliding window of fetched blocks, keyed by slot.
//!
//! The cache only moves forward: `fetched_through` is the highest slot whose
//! header lookup completed (present or empty). Slots at or below it are never
//! fetched again. Eviction removes everything up to a slot once that epoch is
//! durably persisted.
//!
//! Not synchronized; owned by the single worker task.

use crate::domain::{CachedBlock, EpochRange};
use std::collections::BTreeMap;

/// Slot-keyed cache of blocks with a forward-only fetch mark.
#[derive(Debug, Default)]
pub struct BlockCache {
    blocks: BTreeMap<u64, CachedBlock>,
    fetched_through: Option<u64>,
}

impl BlockCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the header lookup for `slot` already completed.
    pub fn is_fetched(&self, slot: u64) -> bool {
        self.fetched_through.is_some_and(|mark| slot <= mark)
    }

    /// Highest slot whose lookup completed.
    pub fn fetched_through(&self) -> Option<u64> {
        self.fetched_through
    }

    /// Record that the lookup for `slot` completed. The mark never moves back.
    pub fn mark_fetched(&mut self, slot: u64) {
        if !self.is_fetched(slot) {
            self.fetched_through = Some(slot);
        }
    }

    /// Insert a fetched block and advance the mark to its slot.
    ///
    /// An already cached slot keeps its original entry.
    pub fn insert(&mut self, block: CachedBlock) {
        let slot = block.slot;
        self.blocks.entry(slot).or_insert(block);
        self.mark_fetched(slot);
    }

    /// Cached block at `slot`.
    pub fn get(&self, slot: u64) -> Option<&CachedBlock> {
        self.blocks.get(&slot)
    }

    /// Cached blocks inside `range`, in slot order.
    pub fn range(&self, range: EpochRange) -> impl Iterator<Item = &CachedBlock> {
        self.blocks.range(range.slots()).map(|(_, block)| block)
    }

    /// First cached block inside `range`.
    pub fn first_in(&self, range: EpochRange) -> Option<&CachedBlock> {
        self.range(range).next()
    }

    /// Drop every block at or below `last_slot`. Returns the number evicted.
    pub fn evict_through(&mut self, last_slot: u64) -> usize {
        let before = self.blocks.len();
        self.blocks = self.blocks.split_off(&last_slot.saturating_add(1));
        before - self.blocks.len()
    }

    /// Lowest cached slot.
    pub fn lowest_slot(&self) -> Option<u64> {
        self.blocks.keys().next().copied()
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockBody, BlockHeader};

    fn block(slot: u64) -> CachedBlock {
        CachedBlock {
            slot,
            root: [slot as u8; 32],
            header: BlockHeader {
                slot,
                proposer_index: slot,
                parent_root: [0u8; 32],
                state_root: [0u8; 32],
                body_root: [0u8; 32],
            },
            body: BlockBody::default(),
        }
    }

    #[test]
    fn test_empty_cache_fetches_slot_zero() {
        let cache = BlockCache::new();
        assert!(!cache.is_fetched(0));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_advances_mark() {
        let mut cache = BlockCache::new();
        cache.insert(block(3));
        assert!(cache.is_fetched(0));
        assert!(cache.is_fetched(3));
        assert!(!cache.is_fetched(4));
        assert_eq!(cache.fetched_through(), Some(3));
    }

    #[test]
    fn test_mark_never_moves_back() {
        let mut cache = BlockCache::new();
        cache.mark_fetched(10);
        cache.mark_fetched(4);
        assert_eq!(cache.fetched_through(), Some(10));
    }

    #[test]
    fn test_insert_keeps_first_entry() {
        let mut cache = BlockCache::new();
        cache.insert(block(5));
        let mut other = block(5);
        other.root = [0xff; 32];
        cache.insert(other);
        assert_eq!(cache.get(5).unwrap().root, [5u8; 32]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_range_and_first() {
        let mut cache = BlockCache::new();
        for slot in [1, 3, 9, 12] {
            cache.insert(block(slot));
        }
        let range = EpochRange::of(1, 8);
        let slots: Vec<u64> = cache.range(range).map(|b| b.slot).collect();
        assert_eq!(slots, vec![9, 12]);
        assert_eq!(cache.first_in(EpochRange::of(0, 8)).unwrap().slot, 1);
        assert!(cache.first_in(EpochRange::of(2, 8)).is_none());
    }

    #[test]
    fn test_evict_through_keeps_lookahead() {
        let mut cache = BlockCache::new();
        for slot in [1, 3, 9, 12] {
            cache.insert(block(slot));
        }
        assert_eq!(cache.evict_through(7), 2);
        assert_eq!(cache.lowest_slot(), Some(9));
        assert_eq!(cache.fetched_through(), Some(12));
    }
}
