//! # Domain Value Objects
//!
//! Immutable value types produced while synchronizing an epoch.

use super::errors::Root;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Inclusive slot range of one epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochRange {
    /// First slot of the epoch.
    pub first_slot: u64,
    /// Last slot of the epoch.
    pub last_slot: u64,
}

impl EpochRange {
    /// Slot range of `epoch`.
    ///
    /// Saturates at `u64::MAX`; use [`EpochRange::checked_with_lookahead`]
    /// to reject epochs whose slots do not fit.
    pub fn of(epoch: u64, slots_per_epoch: u64) -> Self {
        Self::with_lookahead(epoch, 0, slots_per_epoch)
    }

    /// Range of `epoch` extended by `lookahead` further epochs.
    pub fn with_lookahead(epoch: u64, lookahead: u64, slots_per_epoch: u64) -> Self {
        let first_slot = epoch.saturating_mul(slots_per_epoch);
        let len = slots_per_epoch.saturating_mul(lookahead.saturating_add(1));
        Self {
            first_slot,
            last_slot: first_slot.saturating_add(len.saturating_sub(1)),
        }
    }

    /// Like [`EpochRange::with_lookahead`], `None` when a slot would not fit
    /// in `u64` or the range would be empty.
    pub fn checked_with_lookahead(
        epoch: u64,
        lookahead: u64,
        slots_per_epoch: u64,
    ) -> Option<Self> {
        let first_slot = epoch.checked_mul(slots_per_epoch)?;
        let len = slots_per_epoch.checked_mul(lookahead.checked_add(1)?)?;
        let last_slot = first_slot.checked_add(len.checked_sub(1)?)?;
        Some(Self {
            first_slot,
            last_slot,
        })
    }

    /// Whether `slot` falls inside the range.
    pub fn contains(&self, slot: u64) -> bool {
        (self.first_slot..=self.last_slot).contains(&slot)
    }

    /// Slots of the range.
    pub fn slots(&self) -> RangeInclusive<u64> {
        self.first_slot..=self.last_slot
    }
}

/// Vote tally (amounts in gwei of effective balance).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteTally {
    /// Effective balance voting for the epoch's target root.
    pub target_vote_amount: u64,
    /// Effective balance voting for the correct head.
    pub head_vote_amount: u64,
    /// Effective balance of all counted votes.
    pub total_vote_amount: u64,
    /// Number of validators voting for the target root.
    pub target_vote_count: u64,
    /// Number of validators voting for the correct head.
    pub head_vote_count: u64,
    /// Number of counted validators.
    pub total_vote_count: u64,
}

impl VoteTally {
    /// Combine two tallies.
    pub fn merged(&self, other: &VoteTally) -> VoteTally {
        VoteTally {
            target_vote_amount: self.target_vote_amount + other.target_vote_amount,
            head_vote_amount: self.head_vote_amount + other.head_vote_amount,
            total_vote_amount: self.total_vote_amount + other.total_vote_amount,
            target_vote_count: self.target_vote_count + other.target_vote_count,
            head_vote_count: self.head_vote_count + other.head_vote_count,
            total_vote_count: self.total_vote_count + other.total_vote_count,
        }
    }
}

/// Aggregated votes for one epoch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochVotes {
    /// Epoch the votes target.
    pub epoch: u64,
    /// Target root the votes were scored against.
    pub target_root: Option<Root>,
    /// Votes included in the epoch's own blocks.
    pub current_epoch: VoteTally,
    /// Votes included in the following epoch's blocks.
    pub next_epoch: VoteTally,
    /// Validators with at least one counted vote.
    pub activity: BTreeSet<u64>,
    /// Mean sync committee participation over the epoch's blocks.
    pub sync_participation: f32,
}

impl EpochVotes {
    /// Current and next epoch tallies combined.
    pub fn total(&self) -> VoteTally {
        self.current_epoch.merged(&self.next_epoch)
    }
}

/// Outcome of a single epoch step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochOutcome {
    /// Storage already had the epoch; nothing was fetched.
    AlreadySynced,
    /// The epoch was fetched, aggregated and committed.
    Synced,
    /// A stop signal was observed; nothing was persisted.
    Cancelled,
}

impl EpochOutcome {
    /// Whether the worker may advance past the epoch.
    pub fn is_done(&self) -> bool {
        matches!(self, EpochOutcome::AlreadySynced | EpochOutcome::Synced)
    }
}

/// Persisted form of the sync cursor.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexerSyncState {
    /// Highest fully processed epoch.
    pub epoch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_range() {
        let range = EpochRange::of(100, 8);
        assert_eq!(range.first_slot, 800);
        assert_eq!(range.last_slot, 807);
        assert!(range.contains(803));
        assert!(!range.contains(808));
    }

    #[test]
    fn test_lookahead_range() {
        let range = EpochRange::with_lookahead(100, 1, 8);
        assert_eq!(range.first_slot, 800);
        assert_eq!(range.last_slot, 815);
        assert_eq!(range.slots().count(), 16);
    }

    #[test]
    fn test_epoch_zero_range() {
        let range = EpochRange::of(0, 32);
        assert_eq!(range.slots(), 0..=31);
    }

    #[test]
    fn test_checked_range_rejects_overflow() {
        assert_eq!(
            EpochRange::checked_with_lookahead(100, 1, 8),
            Some(EpochRange::with_lookahead(100, 1, 8))
        );
        assert_eq!(EpochRange::checked_with_lookahead(u64::MAX / 8, 1, 8), None);
        assert_eq!(EpochRange::checked_with_lookahead(u64::MAX, 0, 2), None);
        assert_eq!(EpochRange::checked_with_lookahead(3, 1, 0), None);
    }

    #[test]
    fn test_range_saturates_instead_of_overflowing() {
        let range = EpochRange::of(u64::MAX / 8, 8);
        assert_eq!(range.last_slot, u64::MAX);
        assert!(range.first_slot <= range.last_slot);
    }

    #[test]
    fn test_outcome_done() {
        assert!(EpochOutcome::Synced.is_done());
        assert!(EpochOutcome::AlreadySynced.is_done());
        assert!(!EpochOutcome::Cancelled.is_done());
    }

    #[test]
    fn test_tally_merge() {
        let a = VoteTally {
            target_vote_amount: 32,
            total_vote_amount: 32,
            target_vote_count: 1,
            total_vote_count: 1,
            ..Default::default()
        };
        let merged = a.merged(&a);
        assert_eq!(merged.target_vote_amount, 64);
        assert_eq!(merged.total_vote_count, 2);
        assert_eq!(merged.head_vote_amount, 0);
    }
}
