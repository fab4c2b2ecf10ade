//! # Persisted Records
//!
//! Rows written for every synchronized epoch. These are the read surface for
//! whatever presents the index.

use super::errors::Root;
use serde::{Deserialize, Serialize};

/// Whether a slot produced a block.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockStatus {
    /// A block was proposed and is part of the synchronized chain.
    Canonical,
    /// The assigned proposer did not produce a block.
    Missed,
}

/// One row per slot of a synchronized epoch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BlockRecord {
    /// Slot number.
    pub slot: u64,
    /// Epoch of the slot.
    pub epoch: u64,
    /// Block root (`None` for missed slots).
    pub root: Option<Root>,
    /// Parent root.
    pub parent_root: Option<Root>,
    /// Post-state root.
    pub state_root: Option<Root>,
    /// Proposer (assigned proposer for missed slots).
    pub proposer: Option<u64>,
    /// Canonical or missed.
    pub status: BlockStatus,
    /// Proposer graffiti.
    pub graffiti: Option<Root>,
    /// Included attestations.
    pub attestation_count: u64,
    /// Included deposits.
    pub deposit_count: u64,
    /// Included voluntary exits.
    pub exit_count: u64,
    /// Included proposer slashings.
    pub proposer_slashing_count: u64,
    /// Included attester slashings.
    pub attester_slashing_count: u64,
    /// Execution withdrawals.
    pub withdrawal_count: u64,
    /// Blob commitments.
    pub blob_count: u64,
    /// Sync committee participation of this block.
    pub sync_participation: f32,
}

/// One row per synchronized epoch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EpochRecord {
    /// Epoch number.
    pub epoch: u64,
    /// Target root votes were scored against.
    pub target_root: Option<Root>,
    /// Dependent root of the duties.
    pub dependent_root: Root,
    /// Active validators.
    pub validator_count: u64,
    /// Active effective balance (gwei).
    pub eligible_amount: u64,
    /// Target votes (gwei), current + next epoch inclusion.
    pub voted_target: u64,
    /// Head votes (gwei), current + next epoch inclusion.
    pub voted_head: u64,
    /// All counted votes (gwei), current + next epoch inclusion.
    pub voted_total: u64,
    /// Validators with a counted vote.
    pub voter_count: u64,
    /// Proposed blocks.
    pub block_count: u64,
    /// Missed slots.
    pub missed_count: u64,
    /// Attestations included in the epoch's blocks.
    pub attestation_count: u64,
    /// Deposits included in the epoch's blocks.
    pub deposit_count: u64,
    /// Exits included in the epoch's blocks.
    pub exit_count: u64,
    /// Mean sync committee participation.
    pub sync_participation: f32,
}

/// Everything one transaction writes for an epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochData {
    /// Epoch row.
    pub epoch: EpochRecord,
    /// Slot rows, ordered by slot.
    pub blocks: Vec<BlockRecord>,
}
