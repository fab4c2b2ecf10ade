//! Derivation of the rows persisted for an epoch.

use crate::domain::{
    BlockRecord, BlockStatus, CachedBlock, EpochData, EpochRange, EpochRecord, EpochStats,
    EpochVotes,
};

/// Build the block and epoch rows for `stats.epoch`.
///
/// `blocks` are the cached blocks of the epoch's own slot range; every slot
/// without a block becomes a `Missed` row carrying the assigned proposer.
pub fn build_epoch_data(
    blocks: &[&CachedBlock],
    stats: &EpochStats,
    votes: &EpochVotes,
    slots_per_epoch: u64,
) -> EpochData {
    let epoch = stats.epoch;
    let range = EpochRange::of(epoch, slots_per_epoch);

    let mut rows = Vec::with_capacity(slots_per_epoch as usize);
    for slot in range.slots() {
        match blocks.iter().find(|block| block.slot == slot) {
            Some(block) => rows.push(canonical_row(block, epoch)),
            None => rows.push(missed_row(slot, epoch, stats)),
        }
    }

    let canonical: Vec<&BlockRecord> = rows
        .iter()
        .filter(|row| row.status == BlockStatus::Canonical)
        .collect();
    let block_count = canonical.len() as u64;
    let sync_rows: Vec<f32> = blocks
        .iter()
        .filter_map(|block| block.body.sync_aggregate.as_ref())
        .map(|aggregate| aggregate.participation())
        .collect();
    let total = votes.total();

    let record = EpochRecord {
        epoch,
        target_root: votes.target_root,
        dependent_root: stats.assignments.dependent_root,
        validator_count: stats.validator_stats.validator_count,
        eligible_amount: stats.validator_stats.eligible_amount,
        voted_target: total.target_vote_amount,
        voted_head: total.head_vote_amount,
        voted_total: total.total_vote_amount,
        voter_count: votes.activity.len() as u64,
        block_count,
        missed_count: slots_per_epoch - block_count,
        attestation_count: canonical.iter().map(|row| row.attestation_count).sum(),
        deposit_count: canonical.iter().map(|row| row.deposit_count).sum(),
        exit_count: canonical.iter().map(|row| row.exit_count).sum(),
        sync_participation: if sync_rows.is_empty() {
            0.0
        } else {
            sync_rows.iter().sum::<f32>() / sync_rows.len() as f32
        },
    };

    EpochData {
        epoch: record,
        blocks: rows,
    }
}

fn canonical_row(block: &CachedBlock, epoch: u64) -> BlockRecord {
    let body = &block.body;
    BlockRecord {
        slot: block.slot,
        epoch,
        root: Some(block.root),
        parent_root: Some(block.header.parent_root),
        state_root: Some(block.header.state_root),
        proposer: Some(block.header.proposer_index),
        status: BlockStatus::Canonical,
        graffiti: Some(body.graffiti),
        attestation_count: body.attestations.len() as u64,
        deposit_count: body.deposit_count,
        exit_count: body.voluntary_exit_count,
        proposer_slashing_count: body.proposer_slashing_count,
        attester_slashing_count: body.attester_slashing_count,
        withdrawal_count: body.withdrawal_count,
        blob_count: body.blob_count,
        sync_participation: body
            .sync_aggregate
            .as_ref()
            .map_or(0.0, |aggregate| aggregate.participation()),
    }
}

fn missed_row(slot: u64, epoch: u64, stats: &EpochStats) -> BlockRecord {
    BlockRecord {
        slot,
        epoch,
        root: None,
        parent_root: None,
        state_root: None,
        proposer: stats.assignments.proposer_assignments.get(&slot).copied(),
        status: BlockStatus::Missed,
        graffiti: None,
        attestation_count: 0,
        deposit_count: 0,
        exit_count: 0,
        proposer_slashing_count: 0,
        attester_slashing_count: 0,
        withdrawal_count: 0,
        blob_count: 0,
        sync_participation: 0.0,
    }
}
