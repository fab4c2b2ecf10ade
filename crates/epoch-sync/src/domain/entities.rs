//! # Domain Entities
//!
//! Consensus objects as decoded from the chain node, plus the per-epoch
//! working set the synchronizer builds from them.

use super::errors::Root;
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregation / participation bitfield.
pub type Bitfield = BitVec<u8, Lsb0>;

/// Beacon block header message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Slot the block was proposed in.
    pub slot: u64,
    /// Validator index of the proposer.
    pub proposer_index: u64,
    /// Root of the parent block.
    pub parent_root: Root,
    /// Post-state root.
    pub state_root: Root,
    /// Root of the block body.
    pub body_root: Root,
}

/// Header lookup response: the block root together with its header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderResponse {
    /// Block root.
    pub root: Root,
    /// Decoded header.
    pub header: BlockHeader,
}

/// FFG checkpoint (epoch + root).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Checkpoint epoch.
    pub epoch: u64,
    /// Checkpoint block root.
    pub root: Root,
}

/// Attestation vote data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttestationData {
    /// Slot the committee was assigned to.
    pub slot: u64,
    /// Committee index within the slot.
    pub committee_index: u64,
    /// Head vote.
    pub beacon_block_root: Root,
    /// Source checkpoint.
    pub source: Checkpoint,
    /// Target checkpoint.
    pub target: Checkpoint,
}

/// Aggregated attestation as included in a block body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attestation {
    /// Bit `i` set means the `i`-th committee member voted.
    pub aggregation_bits: Bitfield,
    /// Vote data.
    pub data: AttestationData,
}

/// Sync committee aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncAggregate {
    /// Participation bits of the sync committee.
    pub sync_committee_bits: Bitfield,
}

impl SyncAggregate {
    /// Fraction of set participation bits (0.0 for an empty bitfield).
    pub fn participation(&self) -> f32 {
        let len = self.sync_committee_bits.len();
        if len == 0 {
            return 0.0;
        }
        self.sync_committee_bits.count_ones() as f32 / len as f32
    }
}

/// Beacon block body.
///
/// Operations other than attestations are only counted, the synchronizer
/// never inspects their contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockBody {
    /// Proposer graffiti.
    pub graffiti: Root,
    /// Included attestations.
    pub attestations: Vec<Attestation>,
    /// Sync aggregate (absent before the sync committee fork).
    pub sync_aggregate: Option<SyncAggregate>,
    /// Number of included deposits.
    pub deposit_count: u64,
    /// Number of included voluntary exits.
    pub voluntary_exit_count: u64,
    /// Number of included proposer slashings.
    pub proposer_slashing_count: u64,
    /// Number of included attester slashings.
    pub attester_slashing_count: u64,
    /// Number of execution payload withdrawals.
    pub withdrawal_count: u64,
    /// Number of blob KZG commitments.
    pub blob_count: u64,
}

/// Cached copy of one slot's block.
///
/// Never mutated after insertion into the block cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedBlock {
    /// Slot (unique key in the cache).
    pub slot: u64,
    /// Block root.
    pub root: Root,
    /// Decoded header.
    pub header: BlockHeader,
    /// Decoded body.
    pub body: BlockBody,
}

impl CachedBlock {
    /// Build a cache record from a header response and its body.
    pub fn new(response: HeaderResponse, body: BlockBody) -> Self {
        Self {
            slot: response.header.slot,
            root: response.root,
            header: response.header,
            body,
        }
    }
}

/// Attester committee key: `(slot, committee index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitteeKey {
    /// Committee slot.
    pub slot: u64,
    /// Committee index.
    pub index: u64,
}

impl CommitteeKey {
    /// Create a committee key.
    pub fn new(slot: u64, index: u64) -> Self {
        Self { slot, index }
    }
}

/// Duty schedule for one epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpochAssignments {
    /// Root the duties were computed from.
    pub dependent_root: Root,
    /// State root of the dependent state (validator stats are keyed by it).
    pub dependent_state_root: Root,
    /// Slot -> proposer validator index.
    pub proposer_assignments: BTreeMap<u64, u64>,
    /// Committee -> ordered validator indices.
    pub attester_assignments: BTreeMap<CommitteeKey, Vec<u64>>,
    /// Sync committee members.
    pub sync_assignments: BTreeSet<u64>,
}

/// Validator-state snapshot for the dependent state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    /// Number of active validators.
    pub validator_count: u64,
    /// Sum of active effective balances (gwei).
    pub eligible_amount: u64,
    /// Validator index -> effective balance (gwei).
    pub effective_balances: BTreeMap<u64, u64>,
}

impl ValidatorStats {
    /// Effective balance of a validator, 0 when unknown.
    pub fn effective_balance(&self, validator: u64) -> u64 {
        self.effective_balances.get(&validator).copied().unwrap_or(0)
    }
}

/// Working set for one epoch: assignments plus the validator snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochStats {
    /// Epoch number.
    pub epoch: u64,
    /// Duty schedule.
    pub assignments: EpochAssignments,
    /// Validator snapshot.
    pub validator_stats: ValidatorStats,
}
