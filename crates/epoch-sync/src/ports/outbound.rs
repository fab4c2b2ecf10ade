//! # Outbound Ports
//!
//! Traits for the synchronizer's collaborators: the chain node, the index
//! store and the finality oracle.

use crate::domain::{
    Attestation, AttestationData, BlockBody, BlockHeader, CachedBlock, Checkpoint, CommitteeKey,
    EpochAssignments, EpochStats, EpochVotes, HeaderResponse, Root, SyncError, SyncResult,
    ValidatorStats,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

/// Chain node client - outbound port.
///
/// Any error is transient: the synchronizer retries the whole epoch.
#[async_trait]
pub trait BeaconNodeClient: Send + Sync {
    /// Duty assignments of an epoch (`None` when the node has none).
    async fn get_epoch_assignments(&self, epoch: u64) -> SyncResult<Option<EpochAssignments>>;

    /// Header of the block at `slot` (`None` for an empty slot).
    async fn get_block_header_by_slot(&self, slot: u64) -> SyncResult<Option<HeaderResponse>>;

    /// Body of the block with root `root`.
    async fn get_block_body_by_root(&self, root: &Root) -> SyncResult<BlockBody>;

    /// Validator snapshot of the state with root `state_root`.
    async fn get_validator_stats(&self, state_root: &Root) -> Option<ValidatorStats>;

    /// Client identifier (for logging).
    fn client_id(&self) -> &str;
}

/// Index store - outbound port.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Whether the epoch's records are already stored.
    async fn is_epoch_synchronized(&self, epoch: u64) -> SyncResult<bool>;

    /// Open a write transaction.
    async fn begin_transaction(&self) -> SyncResult<Box<dyn StoreTransaction>>;

    /// Persisted sync cursor (`None` before the first epoch).
    async fn sync_cursor(&self) -> SyncResult<Option<u64>>;
}

/// Write transaction of a [`SyncStore`].
///
/// Writes become visible only on [`commit`](StoreTransaction::commit).
/// Dropping an uncommitted transaction rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Stage the derived records of an epoch of `slots_per_epoch` slots.
    async fn persist_epoch_data(
        &mut self,
        epoch: u64,
        slots_per_epoch: u64,
        blocks: &[&CachedBlock],
        stats: &EpochStats,
        votes: &EpochVotes,
    ) -> SyncResult<()>;

    /// Stage the sync cursor update.
    async fn set_sync_cursor(&mut self, epoch: u64) -> SyncResult<()>;

    /// Apply all staged writes atomically.
    async fn commit(self: Box<Self>) -> SyncResult<()>;

    /// Discard all staged writes.
    fn rollback(self: Box<Self>) {}
}

/// Finality oracle - outbound port.
#[async_trait]
pub trait FinalityOracle: Send + Sync {
    /// Highest finalized epoch, negative when nothing is finalized yet.
    async fn finalized_epoch(&self) -> i64;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock chain node serving a scripted chain.
pub struct MockBeaconNode {
    /// Node identifier.
    pub id: String,
    /// Epoch -> duties.
    pub assignments: BTreeMap<u64, EpochAssignments>,
    /// Slot -> header.
    pub headers: BTreeMap<u64, HeaderResponse>,
    /// Root -> body.
    pub bodies: HashMap<Root, BlockBody>,
    /// State root -> validator snapshot.
    pub validator_stats: HashMap<Root, ValidatorStats>,
    /// Delay applied to every header lookup.
    pub header_delay: Option<Duration>,
    /// Head of the scripted chain.
    tip: Root,
    fail_headers: AtomicBool,
    stats_unavailable: AtomicBool,
    fail_header_slots: Mutex<BTreeSet<u64>>,
    header_requests: Mutex<Vec<u64>>,
    body_requests: Mutex<Vec<Root>>,
    assignment_requests: Mutex<Vec<u64>>,
}

impl Default for MockBeaconNode {
    fn default() -> Self {
        Self {
            id: "mock-beacon-1".to_string(),
            assignments: BTreeMap::new(),
            headers: BTreeMap::new(),
            bodies: HashMap::new(),
            validator_stats: HashMap::new(),
            header_delay: None,
            tip: [0u8; 32],
            fail_headers: AtomicBool::new(false),
            stats_unavailable: AtomicBool::new(false),
            fail_header_slots: Mutex::new(BTreeSet::new()),
            header_requests: Mutex::new(Vec::new()),
            body_requests: Mutex::new(Vec::new()),
            assignment_requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockBeaconNode {
    /// Root the mock assigns to a block.
    pub fn block_root(slot: u64, parent_root: &Root) -> Root {
        let mut hasher = Sha256::new();
        hasher.update(slot.to_le_bytes());
        hasher.update(parent_root);
        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }

    /// Dependent state root the mock uses for an epoch's duties.
    pub fn state_root(epoch: u64) -> Root {
        let mut hasher = Sha256::new();
        hasher.update(b"state");
        hasher.update(epoch.to_le_bytes());
        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }

    /// Script duties and a validator snapshot for `epoch`.
    ///
    /// One committee per slot of `committee_size` validators; the proposer
    /// of each slot is its first committee member.
    pub fn add_epoch(&mut self, epoch: u64, slots_per_epoch: u64, committee_size: u64) {
        let first_slot = epoch * slots_per_epoch;
        let mut assignments = EpochAssignments {
            dependent_root: Self::state_root(epoch.saturating_sub(1)),
            dependent_state_root: Self::state_root(epoch),
            ..Default::default()
        };
        let mut stats = ValidatorStats::default();

        for offset in 0..slots_per_epoch {
            let slot = first_slot + offset;
            let committee: Vec<u64> = (0..committee_size)
                .map(|i| offset * committee_size + i)
                .collect();
            if let Some(&proposer) = committee.first() {
                assignments.proposer_assignments.insert(slot, proposer);
            }
            for &validator in &committee {
                stats.effective_balances.insert(validator, 32_000_000_000);
            }
            assignments
                .attester_assignments
                .insert(CommitteeKey::new(slot, 0), committee);
        }
        assignments.sync_assignments = stats.effective_balances.keys().copied().collect();
        stats.validator_count = stats.effective_balances.len() as u64;
        stats.eligible_amount = stats.effective_balances.values().sum();

        self.validator_stats
            .insert(assignments.dependent_state_root, stats);
        self.assignments.insert(epoch, assignments);
    }

    /// Append a block at `slot` on top of the current tip. Returns its root.
    ///
    /// The block carries a full attestation for the previous slot's
    /// committee when one is scripted.
    pub fn add_block(&mut self, slot: u64) -> Root {
        let parent_root = self.tip;
        let root = Self::block_root(slot, &parent_root);

        let mut body = BlockBody {
            graffiti: [0x67; 32],
            ..Default::default()
        };
        if let Some(prev) = slot.checked_sub(1) {
            let committee = self
                .assignments
                .values()
                .find_map(|duties| duties.attester_assignments.get(&CommitteeKey::new(prev, 0)));
            if let Some(committee) = committee {
                body.attestations.push(Attestation {
                    aggregation_bits: std::iter::repeat(true).take(committee.len()).collect(),
                    data: AttestationData {
                        slot: prev,
                        committee_index: 0,
                        beacon_block_root: parent_root,
                        source: Checkpoint::default(),
                        target: Checkpoint {
                            epoch: 0,
                            root: parent_root,
                        },
                    },
                });
            }
        }

        self.headers.insert(
            slot,
            HeaderResponse {
                root,
                header: BlockHeader {
                    slot,
                    proposer_index: slot,
                    parent_root,
                    state_root: [0u8; 32],
                    body_root: [0u8; 32],
                },
            },
        );
        self.bodies.insert(root, body);
        self.tip = root;
        root
    }

    /// Make every header lookup fail (or succeed again).
    pub fn set_fail_headers(&self, fail: bool) {
        self.fail_headers.store(fail, Ordering::SeqCst);
    }

    /// Make the header lookup of one slot fail until cleared.
    pub fn fail_header_at(&self, slot: u64) {
        self.fail_header_slots.lock().insert(slot);
    }

    /// Clear all per-slot header failures.
    pub fn clear_header_failures(&self) {
        self.fail_header_slots.lock().clear();
    }

    /// Make validator stats unavailable (or available again).
    pub fn set_stats_unavailable(&self, unavailable: bool) {
        self.stats_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Slots whose header was requested, in request order.
    pub fn header_requests(&self) -> Vec<u64> {
        self.header_requests.lock().clone()
    }

    /// Roots whose body was requested, in request order.
    pub fn body_requests(&self) -> Vec<Root> {
        self.body_requests.lock().clone()
    }

    /// Epochs whose duties were requested, in request order.
    pub fn assignment_requests(&self) -> Vec<u64> {
        self.assignment_requests.lock().clone()
    }
}

#[async_trait]
impl BeaconNodeClient for MockBeaconNode {
    async fn get_epoch_assignments(&self, epoch: u64) -> SyncResult<Option<EpochAssignments>> {
        self.assignment_requests.lock().push(epoch);
        Ok(self.assignments.get(&epoch).cloned())
    }

    async fn get_block_header_by_slot(&self, slot: u64) -> SyncResult<Option<HeaderResponse>> {
        self.header_requests.lock().push(slot);
        if let Some(delay) = self.header_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_headers.load(Ordering::SeqCst) || self.fail_header_slots.lock().contains(&slot)
        {
            return Err(SyncError::Network("Mock failure".to_string()));
        }
        Ok(self.headers.get(&slot).cloned())
    }

    async fn get_block_body_by_root(&self, root: &Root) -> SyncResult<BlockBody> {
        self.body_requests.lock().push(*root);
        self.bodies
            .get(root)
            .cloned()
            .ok_or_else(|| SyncError::Network(format!("unknown block {}", hex::encode(root))))
    }

    async fn get_validator_stats(&self, state_root: &Root) -> Option<ValidatorStats> {
        if self.stats_unavailable.load(Ordering::SeqCst) {
            return None;
        }
        self.validator_stats.get(state_root).cloned()
    }

    fn client_id(&self) -> &str {
        &self.id
    }
}

/// Mock finality oracle with a settable finalized epoch.
#[derive(Debug)]
pub struct MockFinalityOracle {
    finalized: AtomicI64,
}

impl MockFinalityOracle {
    /// Create an oracle reporting `finalized`.
    pub fn new(finalized: i64) -> Self {
        Self {
            finalized: AtomicI64::new(finalized),
        }
    }

    /// Move the finalized epoch.
    pub fn set_finalized(&self, finalized: i64) {
        self.finalized.store(finalized, Ordering::SeqCst);
    }
}

#[async_trait]
impl FinalityOracle for MockFinalityOracle {
    async fn finalized_epoch(&self) -> i64 {
        self.finalized.load(Ordering::SeqCst)
    }
}
