//! # Poll Sync Engine
//!
//! Discovers completions by periodically probing `/health` and fetching
//! `/completed_tasks?since=<cursor>`.
//!
//! ## Cycle State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Poll Cycle                                     │
//! │                                                                         │
//! │   ┌────────────┐   ok    ┌────────────┐   ok    ┌──────────────────┐   │
//! │   │  /health   │ ──────► │  fetch     │ ──────► │ deliver new,     │   │
//! │   └─────┬──────┘         │  ?since=   │         │ advance cursor,  │   │
//! │         │ err            └─────┬──────┘         │ retry_count = 0  │   │
//! │         ▼                      │ err            └────────┬─────────┘   │
//! │   ┌──────────────────────────────┐                       │             │
//! │   │ retry_count += 1             │                       │ sleep       │
//! │   │ > max_failures ? ──► ERROR   │                       │ interval    │
//! │   │ else sleep backoff(count)    │                       ▼             │
//! │   └──────────────┬───────────────┘                  next cycle         │
//! │                  └──────────────────────────────────► next cycle       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Each `start()`/`reset()` launches a new lineage tagged with a generation
//! number. A lineage first waits for its predecessor to finish, so at most
//! one fetch is ever in flight. Results from a superseded generation are
//! dropped without touching state or delivering anything.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use threadflow_core::{BackoffPolicy, CompletedItem, CursorTracker, ItemId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::CompletionSink;
use crate::error::SyncResult;
use crate::http::CompletionSource;
use crate::status::SyncMode;

/// Message recorded when the failure ceiling is exceeded.
pub const RETRY_EXHAUSTED_MESSAGE: &str =
    "Maximum retry count reached. Please check your connection and try again.";

// =============================================================================
// Configuration
// =============================================================================

/// Poll engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay after a successful cycle.
    pub interval: Duration,

    /// Consecutive failures tolerated; one more moves the engine to Error.
    pub max_failures: u32,

    /// Delay schedule after a failure.
    pub backoff: BackoffPolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_millis(3_000),
            max_failures: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Snapshot of the poll engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollStatus {
    pub mode: SyncMode,

    /// Consecutive failed cycles.
    pub retry_count: u32,

    /// Identifier of the newest completion seen.
    pub cursor: Option<ItemId>,

    pub last_error: Option<String>,

    /// Delay before the next scheduled cycle, if one is scheduled.
    pub next_delay: Option<Duration>,
}

struct PollState {
    mode: SyncMode,
    retry_count: u32,
    cursor: CursorTracker,
    last_error: Option<String>,
    next_delay: Option<Duration>,
    generation: u64,
    cancel: CancellationToken,
    lineage: Option<JoinHandle<()>>,
}

impl PollState {
    fn snapshot(&self) -> PollStatus {
        PollStatus {
            mode: self.mode,
            retry_count: self.retry_count,
            cursor: self.cursor.current().cloned(),
            last_error: self.last_error.clone(),
            next_delay: self.next_delay,
        }
    }
}

struct PollShared<S> {
    source: S,
    config: PollConfig,
    sink: CompletionSink,
    state: Mutex<PollState>,
    status_tx: watch::Sender<PollStatus>,
}

// =============================================================================
// Engine
// =============================================================================

/// HTTP polling engine.
///
/// Must be started from within a Tokio runtime. Dropping the engine cancels
/// any pending cycle.
pub struct PollSyncEngine<S: CompletionSource> {
    shared: Arc<PollShared<S>>,
}

impl<S: CompletionSource> PollSyncEngine<S> {
    /// Creates an idle engine.
    pub fn new(source: S, config: PollConfig, sink: CompletionSink) -> Self {
        let state = PollState {
            mode: SyncMode::Idle,
            retry_count: 0,
            cursor: CursorTracker::new(),
            last_error: None,
            next_delay: None,
            generation: 0,
            cancel: CancellationToken::new(),
            lineage: None,
        };
        let (status_tx, _) = watch::channel(state.snapshot());
        PollSyncEngine {
            shared: Arc::new(PollShared {
                source,
                config,
                sink,
                state: Mutex::new(state),
                status_tx,
            }),
        }
    }

    /// Begins polling immediately.
    ///
    /// No-op when already active. From Error, call [`reset`](Self::reset)
    /// (or `stop` then `start`) instead.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        match state.mode {
            SyncMode::Active => debug!("Poll engine already active"),
            SyncMode::Error => warn!("Poll engine is in error; reset() to resume"),
            SyncMode::Idle => {
                info!(
                    interval_ms = self.shared.config.interval.as_millis() as u64,
                    "Starting poll engine"
                );
                self.launch(&mut state);
            }
        }
    }

    /// Stops polling. Any in-flight cycle result is discarded.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.mode == SyncMode::Idle {
            return;
        }
        state.mode = SyncMode::Idle;
        state.generation += 1;
        state.cancel.cancel();
        state.next_delay = None;
        info!(retry_count = state.retry_count, "Poll engine stopped");
        self.shared.publish(&state);
    }

    /// Clears retry count, error and cursor, then starts fresh.
    ///
    /// Deduplication state is kept: items already delivered stay suppressed.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.cancel.cancel();
        state.generation += 1;
        state.retry_count = 0;
        state.cursor.reset();
        state.last_error = None;
        info!("Poll engine reset");
        self.launch(&mut state);
    }

    /// Returns the latest snapshot without waiting on any cycle.
    pub fn status(&self) -> PollStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.shared.status_tx.subscribe()
    }

    fn launch(&self, state: &mut PollState) {
        state.generation += 1;
        state.mode = SyncMode::Active;
        state.last_error = None;
        state.next_delay = None;

        let cancel = CancellationToken::new();
        state.cancel = cancel.clone();

        let previous = state.lineage.take();
        let shared = Arc::clone(&self.shared);
        let generation = state.generation;
        state.lineage = Some(tokio::spawn(run_lineage(shared, generation, cancel, previous)));

        self.shared.publish(state);
    }
}

impl<S: CompletionSource> Drop for PollSyncEngine<S> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.cancel.cancel();
    }
}

// =============================================================================
// Cycle Execution
// =============================================================================

async fn run_lineage<S: CompletionSource>(
    shared: Arc<PollShared<S>>,
    generation: u64,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let cursor = shared.state.lock().cursor.current().cloned();
        let outcome = shared.run_cycle(cursor.as_ref()).await;

        let Some(delay) = shared.apply_outcome(generation, outcome) else {
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

impl<S: CompletionSource> PollShared<S> {
    async fn run_cycle(&self, cursor: Option<&ItemId>) -> SyncResult<Vec<CompletedItem>> {
        debug!(cursor = ?cursor.map(ItemId::as_str), "Poll cycle");
        self.source.check_health().await?;
        self.source.fetch_completed(cursor).await
    }

    /// Folds a cycle result into state. Returns the delay before the next
    /// cycle, or `None` when the lineage should end.
    fn apply_outcome(
        &self,
        generation: u64,
        outcome: SyncResult<Vec<CompletedItem>>,
    ) -> Option<Duration> {
        let mut state = self.state.lock();
        if state.generation != generation || state.mode != SyncMode::Active {
            debug!(generation, "Discarding superseded poll result");
            return None;
        }

        match outcome {
            Ok(items) => {
                let moved = state.cursor.advance_to_batch_end(&items);
                let fetched = items.len();
                let delivered = self.sink.deliver_batch(items);
                if fetched > 0 {
                    debug!(
                        fetched,
                        delivered,
                        moved,
                        cursor = ?state.cursor.current().map(ItemId::as_str),
                        "Poll cycle complete"
                    );
                }

                state.retry_count = 0;
                state.last_error = None;
                state.next_delay = Some(self.config.interval);
                self.publish(&state);
                Some(self.config.interval)
            }
            Err(err) => {
                state.retry_count = state.retry_count.saturating_add(1);

                if state.retry_count > self.config.max_failures {
                    error!(retry_count = state.retry_count, error = %err, "Poll retries exhausted");
                    state.mode = SyncMode::Error;
                    state.last_error = Some(RETRY_EXHAUSTED_MESSAGE.to_string());
                    state.next_delay = None;
                    self.publish(&state);
                    return None;
                }

                let delay = self.config.backoff.compute_delay(state.retry_count);
                warn!(
                    retry_count = state.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Poll cycle failed"
                );
                state.last_error = Some(err.to_string());
                state.next_delay = Some(delay);
                self.publish(&state);
                Some(delay)
            }
        }
    }

    fn publish(&self, state: &PollState) {
        self.status_tx.send_replace(state.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::mock::MockCompletionSource;

    fn engine(
        mock: &MockCompletionSource,
    ) -> (
        PollSyncEngine<MockCompletionSource>,
        crate::delivery::CompletionReceiver,
    ) {
        let (sink, rx) = CompletionSink::channel();
        (PollSyncEngine::new(mock.clone(), PollConfig::default(), sink), rx)
    }

    async fn wait_for(
        engine: &PollSyncEngine<MockCompletionSource>,
        predicate: impl FnMut(&PollStatus) -> bool,
    ) {
        let mut rx = engine.subscribe();
        rx.wait_for(predicate).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_is_immediate() {
        let mock = MockCompletionSource::new();
        mock.push_ids(&["a"]);
        let (engine, mut rx) = engine(&mock);

        let started = tokio::time::Instant::now();
        engine.start();
        assert_eq!(engine.status().mode, SyncMode::Active);

        let item = rx.recv().await.unwrap();
        assert_eq!(item.id.as_str(), "a");
        assert_eq!(mock.calls()[0].at, started);
        assert!(mock.calls()[0].since.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_runs_one_lineage() {
        let mock = MockCompletionSource::new();
        let (engine, _rx) = engine(&mock);

        engine.start();
        engine.start();
        tokio::time::sleep(Duration::from_millis(9_500)).await;

        // Cycles at 0s, 3s, 6s, 9s.
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_success_resets_retry() {
        let mock = MockCompletionSource::new();
        mock.push_fetch_error(SyncError::FetchFailed("HTTP 502".into()));
        mock.push_ids(&["a"]);
        let (engine, mut rx) = engine(&mock);

        engine.start();
        wait_for(&engine, |s| s.retry_count == 1).await;
        let status = engine.status();
        assert_eq!(status.last_error.as_deref(), Some("Failed to fetch completed tasks: HTTP 502"));
        assert_eq!(status.next_delay, Some(Duration::from_millis(7_500)));

        assert_eq!(rx.recv().await.unwrap().id.as_str(), "a");
        wait_for(&engine, |s| s.retry_count == 0 && s.cursor.is_some()).await;
        assert!(engine.status().last_error.is_none());

        let calls = mock.calls();
        assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(7_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let mock = MockCompletionSource::new();
        mock.set_latency(Duration::from_secs(1));
        mock.push_ids(&["late"]);
        let (engine, mut rx) = engine(&mock);

        engine.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.call_count(), 1);

        engine.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = engine.status();
        assert_eq!(status.mode, SyncMode::Idle);
        assert!(status.cursor.is_none());
        assert_eq!(mock.call_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_in_flight_cycle() {
        let mock = MockCompletionSource::new();
        mock.set_latency(Duration::from_secs(2));
        let (engine, _rx) = engine(&mock);

        engine.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.stop();
        engine.start();

        // The new lineage only begins once the old fetch returns at 2s.
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(mock.call_count(), 1);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_in_error_is_noop() {
        let mock = MockCompletionSource::new();
        mock.push_outage(6);
        let (sink, _rx) = CompletionSink::channel();
        let engine = PollSyncEngine::new(
            mock.clone(),
            PollConfig {
                backoff: BackoffPolicy::new(
                    Duration::from_millis(10),
                    1.0,
                    Duration::from_millis(10),
                    0,
                ),
                ..PollConfig::default()
            },
            sink,
        );

        engine.start();
        wait_for(&engine, |s| s.mode == SyncMode::Error).await;
        engine.start();
        assert_eq!(engine.status().mode, SyncMode::Error);

        engine.stop();
        assert_eq!(engine.status().mode, SyncMode::Idle);
        assert_eq!(engine.status().retry_count, 6);
    }
}
