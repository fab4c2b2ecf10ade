//! # Epoch Synchronizer Service
//!
//! Owns the background worker that walks epochs from a start epoch up to the
//! finalized head.
//!
//! ## Worker lifecycle
//!
//! ```text
//! start(e) ──► signal old worker ──► acquire run guard ──► spawn worker(e)
//!                                                              │
//!        ┌─────────────────────────────────────────────────────┘
//!        ▼
//!   sync_epoch ─ok─► finalized? ─yes─► complete
//!        │              │no
//!        │err           ▼
//!        ▼          advance cursor
//!   backoff (cancellable)      │
//!        └──────────► cooldown (cancellable) ──► next iteration
//! ```
//!
//! The run guard is moved into the worker and released only when it exits,
//! so at most one worker exists at any time.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::cancel::{StopSender, StopSignal};
use super::epoch_step::EpochProcessor;
use crate::config::SyncConfig;
use crate::domain::{invariant_caught_up, EpochOutcome, SyncResult};
use crate::ports::inbound::EpochSyncApi;
use crate::ports::outbound::{BeaconNodeClient, FinalityOracle, SyncStore};

/// Fields shared with the worker, behind the short field guard.
#[derive(Debug, Default)]
struct SyncState {
    running: bool,
    current_epoch: u64,
    stop_tx: Option<StopSender>,
}

/// Epoch synchronizer - drives one background worker at a time.
pub struct EpochSynchronizer {
    config: SyncConfig,
    client: Arc<dyn BeaconNodeClient>,
    store: Arc<dyn SyncStore>,
    finality: Arc<dyn FinalityOracle>,
    state: Arc<Mutex<SyncState>>,
    /// Held by the worker for its whole run.
    run_guard: Arc<tokio::sync::Mutex<()>>,
    span: Span,
}

impl EpochSynchronizer {
    /// Create an idle synchronizer.
    pub fn new(
        config: SyncConfig,
        client: Arc<dyn BeaconNodeClient>,
        store: Arc<dyn SyncStore>,
        finality: Arc<dyn FinalityOracle>,
    ) -> SyncResult<Self> {
        config.validate()?;
        install_panic_trace_hook();
        Ok(Self {
            config,
            client,
            store,
            finality,
            state: Arc::new(Mutex::new(SyncState::default())),
            run_guard: Arc::new(tokio::sync::Mutex::new(())),
            span: Span::none(),
        })
    }

    /// Parent span for every worker run.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Wait until no worker is running.
    pub async fn wait_for_shutdown(&self) {
        let _guard = self.run_guard.lock().await;
    }
}

#[async_trait]
impl EpochSyncApi for EpochSynchronizer {
    async fn start(&self, from_epoch: u64) {
        let stop_tx = {
            let state = self.state.lock();
            if state.running {
                state.stop_tx.clone()
            } else {
                None
            }
        };
        if let Some(tx) = stop_tx {
            // a full slot already carries a pending stop
            let _ = tx.try_send(());
        }

        let guard = self.run_guard.clone().lock_owned().await;

        let (stop_tx, stop) = StopSignal::channel();
        {
            let mut state = self.state.lock();
            if state.running {
                error!(
                    "[epoch-sync] cannot start at epoch {}: previous worker still marked running",
                    from_epoch
                );
                return;
            }
            state.running = true;
            state.current_epoch = from_epoch;
            state.stop_tx = Some(stop_tx);
        }

        let worker = SyncWorker {
            config: self.config.clone(),
            processor: EpochProcessor::new(
                self.config.clone(),
                self.client.clone(),
                self.store.clone(),
            ),
            client_id: self.client.client_id().to_string(),
            finality: self.finality.clone(),
            state: self.state.clone(),
        };
        let run_id = Uuid::new_v4();
        let span = info_span!(parent: &self.span, "epoch_sync", %run_id, from_epoch);
        tokio::spawn(worker.run(guard, stop).instrument(span));
    }

    fn is_ahead_of(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        state.running && state.current_epoch > epoch
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn current_epoch(&self) -> u64 {
        self.state.lock().current_epoch
    }
}

/// One worker run.
struct SyncWorker {
    config: SyncConfig,
    processor: EpochProcessor,
    client_id: String,
    finality: Arc<dyn FinalityOracle>,
    state: Arc<Mutex<SyncState>>,
}

impl SyncWorker {
    async fn run(mut self, _guard: OwnedMutexGuard<()>, mut stop: StopSignal) {
        let state = self.state.clone();

        let result = AssertUnwindSafe(self.sync_loop(&mut stop))
            .catch_unwind()
            .await;
        if let Err(payload) = result {
            let trace =
                take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());
            error!(
                "[epoch-sync] worker panicked, synchronization stopped: {}\n{}",
                panic_message(payload.as_ref()),
                trace
            );
        }

        let mut state = state.lock();
        state.running = false;
        state.stop_tx = None;
    }

    async fn sync_loop(&mut self, stop: &mut StopSignal) {
        let mut epoch = self.state.lock().current_epoch;
        let head = self.finality.finalized_epoch().await;
        info!(
            client = %self.client_id,
            "[epoch-sync] synchronization started (epoch {}, head {})", epoch, head
        );

        loop {
            match self.processor.sync_epoch(epoch, stop).await {
                Ok(outcome) if !outcome.is_done() => {
                    info!("[epoch-sync] synchronization aborted at epoch {}", epoch);
                    return;
                }
                Ok(outcome) => {
                    let finalized = self.finality.finalized_epoch().await;
                    let Some(next) = epoch.checked_add(1) else {
                        error!("[epoch-sync] no epoch after {}, synchronization stopped", epoch);
                        return;
                    };
                    self.state.lock().current_epoch = next;
                    if outcome == EpochOutcome::Synced {
                        info!("[epoch-sync] synchronized epoch {}", epoch);
                    }
                    if invariant_caught_up(next, finalized) {
                        info!(
                            "[epoch-sync] synchronization complete (epoch {}, head {})",
                            epoch, finalized
                        );
                        return;
                    }
                    epoch = next;
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        "[epoch-sync] cannot synchronize epoch {}: {}, synchronization stopped",
                        epoch, e
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        "[epoch-sync] error while synchronizing epoch {}: {} (retrying in {:?})",
                        epoch,
                        e,
                        self.config.retry_delay()
                    );
                    if stop.wait(self.config.retry_delay()).await {
                        info!("[epoch-sync] synchronization aborted at epoch {}", epoch);
                        return;
                    }
                }
            }

            if stop.wait(self.config.sync_epoch_cooldown()).await {
                info!("[epoch-sync] synchronization aborted at epoch {}", epoch);
                return;
            }
        }
    }
}

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_TRACE_HOOK: Once = Once::new();

/// Record a backtrace for every panic on the panicking thread, then run the
/// previously installed hook.
fn install_panic_trace_hook() {
    PANIC_TRACE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = LAST_PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Backtrace of the last panic on this thread, if the hook recorded one.
fn take_panic_trace() -> Option<String> {
    LAST_PANIC_TRACE
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
