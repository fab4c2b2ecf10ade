//! End-to-end synchronization against the mock chain node and the in-memory
//! store.

use epoch_sync::{
    BlockStatus, EpochOutcome, EpochProcessor, EpochSyncApi, EpochSynchronizer, MemoryStore,
    MockBeaconNode, MockFinalityOracle, StopSignal, SyncConfig, SyncStore,
};
use std::sync::Arc;
use std::time::Duration;

const SPE: u64 = 8;
const BALANCE: u64 = 32_000_000_000;

struct Chain {
    node: Arc<MockBeaconNode>,
    /// Block preceding epoch 100.
    anchor: [u8; 32],
    /// The only block of epoch 100, at slot 803.
    block_803: [u8; 32],
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Epoch 100: slots 800-802 empty, a block at 803, rest empty.
/// Epoch 101: blocks at 809 and 812.
fn chain_around_epoch_100() -> Chain {
    let mut node = MockBeaconNode::default();
    for epoch in 99..=102 {
        node.add_epoch(epoch, SPE, 4);
    }
    let anchor = node.add_block(799);
    let block_803 = node.add_block(803);
    node.add_block(809);
    node.add_block(812);
    Chain {
        node: Arc::new(node),
        anchor,
        block_803,
    }
}

#[tokio::test]
async fn test_epoch_100_end_to_end() {
    init_tracing();
    let chain = chain_around_epoch_100();
    let store = MemoryStore::new();
    let mut processor = EpochProcessor::new(
        SyncConfig::for_testing(),
        chain.node.clone(),
        Arc::new(store.clone()),
    );
    let (_tx, mut stop) = StopSignal::channel();

    let outcome = processor.sync_epoch(100, &mut stop).await.unwrap();
    assert_eq!(outcome, EpochOutcome::Synced);

    // epoch and lookahead, each slot once
    assert_eq!(chain.node.header_requests(), (800..816).collect::<Vec<_>>());
    assert_eq!(chain.node.body_requests().len(), 3);
    assert_eq!(chain.node.body_requests()[0], chain.block_803);

    // checkpoint falls back to the parent of the first block
    let record = store.epoch_record(100).unwrap();
    assert_eq!(record.target_root, Some(chain.anchor));
    assert_eq!(record.block_count, 1);
    assert_eq!(record.missed_count, 7);
    // slot 802's committee voted for target and head
    assert_eq!(record.voter_count, 4);
    assert_eq!(record.voted_target, 4 * BALANCE);
    assert_eq!(record.voted_head, 4 * BALANCE);

    let rows = store.block_records(100);
    assert_eq!(rows.len(), 8);
    for row in &rows {
        let expected = if row.slot == 803 {
            BlockStatus::Canonical
        } else {
            BlockStatus::Missed
        };
        assert_eq!(row.status, expected, "slot {}", row.slot);
    }
    assert_eq!(rows[3].root, Some(chain.block_803));

    assert_eq!(store.sync_cursor().await.unwrap(), Some(100));
    assert_eq!(store.commit_count(), 1);

    // only epoch 100 evicted, lookahead retained
    assert_eq!(processor.cache().len(), 2);
    assert_eq!(processor.cache().lowest_slot(), Some(809));
    assert!(processor.cache().get(803).is_none());
}

#[tokio::test]
async fn test_next_epoch_reuses_lookahead() {
    let chain = chain_around_epoch_100();
    let store = MemoryStore::new();
    let mut processor = EpochProcessor::new(
        SyncConfig::for_testing(),
        chain.node.clone(),
        Arc::new(store.clone()),
    );
    let (_tx, mut stop) = StopSignal::channel();

    processor.sync_epoch(100, &mut stop).await.unwrap();
    processor.sync_epoch(101, &mut stop).await.unwrap();

    assert_eq!(chain.node.header_requests(), (800..824).collect::<Vec<_>>());
    let record = store.epoch_record(101).unwrap();
    assert_eq!(record.block_count, 2);
    // slot 808 is empty, so the checkpoint is the parent of block 809
    assert_eq!(record.target_root, Some(chain.block_803));
    assert_eq!(store.sync_cursor().await.unwrap(), Some(101));
    assert!(processor.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_synchronizer_runs_to_finalized_head() {
    init_tracing();
    let chain = chain_around_epoch_100();
    let store = MemoryStore::new();
    let finality = Arc::new(MockFinalityOracle::new(101));
    let sync = EpochSynchronizer::new(
        SyncConfig::for_testing(),
        chain.node.clone(),
        Arc::new(store.clone()),
        finality,
    )
    .unwrap()
    .with_span(tracing::info_span!("indexer"));

    sync.start(100).await;
    sync.wait_for_shutdown().await;

    assert!(!sync.is_running());
    assert_eq!(store.sync_cursor().await.unwrap(), Some(101));
    assert_eq!(chain.node.assignment_requests(), vec![100, 101]);

    // a second run over synced epochs fetches nothing
    let requests = chain.node.header_requests().len();
    sync.start(100).await;
    sync.wait_for_shutdown().await;
    assert_eq!(chain.node.header_requests().len(), requests);
    assert_eq!(store.commit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_cooldown_keeps_cursor() {
    let chain = chain_around_epoch_100();
    let store = MemoryStore::new();
    let config = SyncConfig {
        sync_epoch_cooldown_secs: 30,
        ..SyncConfig::for_testing()
    };
    let sync = EpochSynchronizer::new(
        config,
        chain.node.clone(),
        Arc::new(store.clone()),
        Arc::new(MockFinalityOracle::new(500)),
    )
    .unwrap();

    sync.start(100).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.sync_cursor().await.unwrap(), Some(100));
    assert!(sync.is_ahead_of(100));

    // epoch 200 has no duties; the new worker retries it without progress
    sync.start(200).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(sync.is_running());
    assert!(!sync.is_ahead_of(200));
    assert_eq!(store.sync_cursor().await.unwrap(), Some(100));
    assert!(!store.is_epoch_synchronized(101).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_fetch_aborts_without_persist() {
    let mut node = MockBeaconNode::default();
    node.add_epoch(100, SPE, 4);
    node.add_block(801);
    node.header_delay = Some(Duration::from_secs(1));
    let node = Arc::new(node);
    let store = MemoryStore::new();
    let sync = EpochSynchronizer::new(
        SyncConfig::for_testing(),
        node.clone(),
        Arc::new(store.clone()),
        Arc::new(MockFinalityOracle::new(500)),
    )
    .unwrap();

    sync.start(100).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(node.header_requests().len(), 4);

    // no duties for epoch 300: the second worker never persists either
    sync.start(300).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(node.header_requests().len() < 16);
    assert_eq!(store.epoch_count(), 0);
    assert_eq!(store.sync_cursor().await.unwrap(), None);
    assert_eq!(sync.current_epoch(), 300);
}
