//! Target root selection.

use super::block_cache::BlockCache;
use crate::domain::{EpochRange, Root};

/// Target (checkpoint) root of the epoch covering `range`.
///
/// The first cached block of the epoch is the checkpoint block when it sits
/// on the epoch's first slot. Otherwise the first slot was empty and the
/// checkpoint is that block's parent. `None` when the epoch has no blocks.
pub fn select_target_root(cache: &BlockCache, range: EpochRange) -> Option<Root> {
    let first = cache.first_in(range)?;
    if first.header.slot == range.first_slot {
        Some(first.root)
    } else {
        Some(first.header.parent_root)
    }
}
