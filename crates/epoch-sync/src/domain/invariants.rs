//! # Domain Invariants
//!
//! Constants and rules that must always hold for the synchronizer.

/// Slots per epoch on mainnet-like chains.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;

/// Epochs fetched beyond the one being processed.
pub const LOOKAHEAD_EPOCHS: u64 = 1;

/// Delay before retrying a failed epoch.
pub const RETRY_DELAY_SECS: u64 = 10;

/// Default pause between epochs.
pub const DEFAULT_SYNC_EPOCH_COOLDOWN_SECS: u64 = 1;

/// Explorer state key holding the sync cursor.
pub const SYNC_STATE_KEY: &str = "indexer.syncstate";

/// Invariant: the sync cursor never moves backwards.
///
/// Re-persisting an older epoch (restart from an earlier cursor over a gap)
/// keeps the higher cursor.
pub fn invariant_cursor_monotonic(current: Option<u64>, epoch: u64) -> u64 {
    match current {
        Some(current) if current > epoch => current,
        _ => epoch,
    }
}

/// Invariant: the worker has caught up once the next epoch to process is
/// beyond the finalized epoch.
pub fn invariant_caught_up(next_epoch: u64, finalized_epoch: i64) -> bool {
    i64::try_from(next_epoch).map_or(true, |next| next > finalized_epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_moves_forward() {
        assert_eq!(invariant_cursor_monotonic(None, 5), 5);
        assert_eq!(invariant_cursor_monotonic(Some(4), 5), 5);
    }

    #[test]
    fn test_cursor_never_regresses() {
        assert_eq!(invariant_cursor_monotonic(Some(9), 5), 9);
    }

    #[test]
    fn test_caught_up() {
        assert!(!invariant_caught_up(10, 10));
        assert!(invariant_caught_up(11, 10));
        assert!(invariant_caught_up(0, -1));
    }
}
