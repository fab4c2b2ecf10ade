//! # Vote Aggregator
//!
//! Scores the attestations found in an epoch's block window against the
//! epoch's duties.
//!
//! ## Rules
//!
//! - Only attestations for slots of the epoch count. Inclusion in one of the
//!   epoch's own blocks credits the current tally, inclusion in a lookahead
//!   block credits the next tally.
//! - Bit `i` of committee `(slot, index)` is the committee's `i`-th validator.
//!   A validator counts once per epoch; the earliest inclusion wins.
//! - Weight is the validator's effective balance in the dependent state.
//! - Target vote: `target.root` equals the epoch's target root.
//! - Head vote: `beacon_block_root` equals the latest block at or before the
//!   attestation slot.
//!
//! Missing blocks never cause an error, they only lower the tallies.

use crate::domain::{
    CachedBlock, CommitteeKey, EpochRange, EpochStats, EpochVotes, Root, LOOKAHEAD_EPOCHS,
};

/// Aggregate votes for `stats.epoch` over a window of cached blocks.
///
/// `window` may be given in any order and may contain blocks outside the
/// epoch and its lookahead; those are ignored.
pub fn aggregate_epoch_votes(
    window: &[&CachedBlock],
    stats: &EpochStats,
    target_root: Option<Root>,
    slots_per_epoch: u64,
) -> EpochVotes {
    let epoch = stats.epoch;
    let epoch_range = EpochRange::of(epoch, slots_per_epoch);
    let window_range = EpochRange::with_lookahead(epoch, LOOKAHEAD_EPOCHS, slots_per_epoch);

    let mut ordered: Vec<&CachedBlock> = window
        .iter()
        .copied()
        .filter(|block| window_range.contains(block.slot))
        .collect();
    ordered.sort_by_key(|block| block.slot);

    let mut votes = EpochVotes {
        epoch,
        target_root,
        ..Default::default()
    };
    let mut sync_sum = 0f32;
    let mut sync_blocks = 0u32;

    for block in &ordered {
        let is_current = epoch_range.contains(block.slot);

        if is_current {
            if let Some(aggregate) = &block.body.sync_aggregate {
                sync_sum += aggregate.participation();
                sync_blocks += 1;
            }
        }

        for attestation in &block.body.attestations {
            let data = &attestation.data;
            if !epoch_range.contains(data.slot) {
                continue;
            }
            let key = CommitteeKey::new(data.slot, data.committee_index);
            let Some(committee) = stats.assignments.attester_assignments.get(&key) else {
                continue;
            };

            let is_target = target_root.is_some_and(|root| root == data.target.root);
            let is_head = head_root_at(&ordered, data.slot)
                .is_some_and(|root| root == data.beacon_block_root);

            let tally = if is_current {
                &mut votes.current_epoch
            } else {
                &mut votes.next_epoch
            };

            for position in attestation.aggregation_bits.iter_ones() {
                let Some(&validator) = committee.get(position) else {
                    continue;
                };
                if !votes.activity.insert(validator) {
                    continue;
                }
                let balance = stats.validator_stats.effective_balance(validator);
                tally.total_vote_amount += balance;
                tally.total_vote_count += 1;
                if is_target {
                    tally.target_vote_amount += balance;
                    tally.target_vote_count += 1;
                }
                if is_head {
                    tally.head_vote_amount += balance;
                    tally.head_vote_count += 1;
                }
            }
        }
    }

    if sync_blocks > 0 {
        votes.sync_participation = sync_sum / sync_blocks as f32;
    }
    votes
}

/// Canonical head at `slot` as seen from the window.
///
/// When the window has no block at or before `slot`, the head is the parent
/// of the window's first block: every slot between it and the window start
/// was fetched and found empty.
fn head_root_at(ordered: &[&CachedBlock], slot: u64) -> Option<Root> {
    match ordered.iter().rev().find(|block| block.slot <= slot) {
        Some(block) => Some(block.root),
        None => ordered.first().map(|block| block.header.parent_root),
    }
}
