//! # Scripted Completion Source
//!
//! An in-memory [`CompletionSource`] that replays queued responses and
//! records every call, for driving the poll engine deterministically.
//!
//! Once the script runs out, health checks succeed and fetches return an
//! empty batch.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use threadflow_core::{CompletedItem, ItemId};
use tokio::time::Instant;

use crate::error::{SyncError, SyncResult};
use crate::http::{CompletionSource, HealthStatus};

/// One recorded poll cycle.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// When the health probe started.
    pub at: Instant,

    /// Cursor passed to the fetch, if the cycle got that far.
    pub since: Option<ItemId>,

    /// Whether the fetch was reached.
    pub fetched: bool,
}

#[derive(Debug, Default)]
struct Script {
    health: VecDeque<SyncResult<HealthStatus>>,
    fetches: VecDeque<SyncResult<Vec<CompletedItem>>>,
    calls: Vec<RecordedCall>,
    latency: Duration,
}

/// Scripted source; clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct MockCompletionSource {
    script: Arc<Mutex<Script>>,
}

impl MockCompletionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful fetch returning `ids` in order.
    pub fn push_ids(&self, ids: &[&str]) -> &Self {
        self.push_batch(ids.iter().map(|id| CompletedItem::new(*id)).collect())
    }

    /// Queues a successful fetch.
    pub fn push_batch(&self, items: Vec<CompletedItem>) -> &Self {
        self.script.lock().fetches.push_back(Ok(items));
        self
    }

    /// Queues a failing fetch.
    pub fn push_fetch_error(&self, err: SyncError) -> &Self {
        self.script.lock().fetches.push_back(Err(err));
        self
    }

    /// Queues a failing health probe (the cycle stops before fetching).
    pub fn push_health_error(&self, err: SyncError) -> &Self {
        self.script.lock().health.push_back(Err(err));
        self
    }

    /// Queues `n` network-style health failures.
    pub fn push_outage(&self, n: usize) -> &Self {
        for _ in 0..n {
            self.push_health_error(SyncError::HealthCheckFailed {
                status: None,
                message: "connection refused".into(),
            });
        }
        self
    }

    /// Makes every fetch take `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = latency;
    }

    /// Returns every recorded cycle.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    /// Returns how many cycles have started.
    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }
}

#[async_trait]
impl CompletionSource for MockCompletionSource {
    async fn check_health(&self) -> SyncResult<HealthStatus> {
        let mut script = self.script.lock();
        script.calls.push(RecordedCall {
            at: Instant::now(),
            since: None,
            fetched: false,
        });
        script.health.pop_front().unwrap_or_else(|| Ok(HealthStatus::ok()))
    }

    async fn fetch_completed(&self, since: Option<&ItemId>) -> SyncResult<Vec<CompletedItem>> {
        let latency = {
            let mut script = self.script.lock();
            if let Some(call) = script.calls.last_mut() {
                call.since = since.cloned();
                call.fetched = true;
            }
            script.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.script
            .lock()
            .fetches
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
