//! # Sync Facade
//!
//! One handle over either engine. Callers get the same lifecycle calls, the
//! same status shape and the same completion stream regardless of transport.
//!
//! ## Status Normalization
//! ```text
//! ┌──────────────────────┬────────────────────────┬────────────────────────┐
//! │                      │ Poll                   │ Push                   │
//! ├──────────────────────┼────────────────────────┼────────────────────────┤
//! │ mode                 │ engine mode            │ running ? active : idle│
//! │ errorMessage         │ last_error             │ last_error             │
//! │ retryOrReconnectCount│ retry_count            │ reconnect_attempts     │
//! └──────────────────────┴────────────────────────┴────────────────────────┘
//! ```
//! The push engine never reports `error`: it keeps reconnecting and only
//! its counter grows.

use parking_lot::Mutex;
use threadflow_core::CompletedItem;
use tokio::sync::watch;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{SyncConfig, TransportKind};
use crate::delivery::{CompletionReceiver, CompletionSink};
use crate::error::{SyncError, SyncResult};
use crate::http::{CompletionSource, HttpCompletionSource};
use crate::poll::{PollConfig, PollStatus, PollSyncEngine};
use crate::push::{PushConfig, PushStatus, PushSyncEngine};
use crate::status::{SyncMode, SyncStatus};

enum Engine<S: CompletionSource> {
    Poll(PollSyncEngine<S>),
    Push(PushSyncEngine),
}

/// Transport-agnostic sync handle.
pub struct SyncFacade<S: CompletionSource = HttpCompletionSource> {
    engine: Engine<S>,
    completions: Mutex<Option<CompletionReceiver>>,
}

impl SyncFacade<HttpCompletionSource> {
    /// Builds the engine selected by `config.sync.transport`.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        match config.transport() {
            TransportKind::Poll => {
                let source = HttpCompletionSource::from_config(config)?;
                Ok(Self::poll(source, config.poll_config()))
            }
            TransportKind::Push => Ok(Self::push(config.push_config())),
        }
    }

    /// Wraps a push engine.
    pub fn push(config: PushConfig) -> Self {
        let (sink, rx) = CompletionSink::channel();
        Self::with_push_engine(PushSyncEngine::new(config, sink), rx)
    }

    /// Wraps an existing push engine and the receiver of its sink.
    pub fn with_push_engine(engine: PushSyncEngine, completions: CompletionReceiver) -> Self {
        SyncFacade {
            engine: Engine::Push(engine),
            completions: Mutex::new(Some(completions)),
        }
    }
}

impl<S: CompletionSource> SyncFacade<S> {
    /// Wraps a poll engine over `source`.
    pub fn poll(source: S, config: PollConfig) -> Self {
        let (sink, rx) = CompletionSink::channel();
        Self::with_poll_engine(PollSyncEngine::new(source, config, sink), rx)
    }

    /// Wraps an existing poll engine and the receiver of its sink.
    pub fn with_poll_engine(engine: PollSyncEngine<S>, completions: CompletionReceiver) -> Self {
        SyncFacade {
            engine: Engine::Poll(engine),
            completions: Mutex::new(Some(completions)),
        }
    }

    /// Which transport this facade drives.
    pub fn transport(&self) -> TransportKind {
        match self.engine {
            Engine::Poll(_) => TransportKind::Poll,
            Engine::Push(_) => TransportKind::Push,
        }
    }

    pub fn start(&self) {
        match &self.engine {
            Engine::Poll(engine) => engine.start(),
            Engine::Push(engine) => engine.start(),
        }
    }

    pub fn stop(&self) {
        match &self.engine {
            Engine::Poll(engine) => engine.stop(),
            Engine::Push(engine) => engine.stop(),
        }
    }

    pub fn reset(&self) {
        match &self.engine {
            Engine::Poll(engine) => engine.reset(),
            Engine::Push(engine) => engine.reset(),
        }
    }

    /// Asks the push engine to drop and re-open its connection.
    ///
    /// Returns false for the poll transport, which has no connection.
    pub fn reconnect(&self) -> bool {
        match &self.engine {
            Engine::Poll(_) => false,
            Engine::Push(engine) => {
                engine.reconnect();
                true
            }
        }
    }

    /// Returns the normalized status snapshot.
    pub fn status(&self) -> SyncStatus {
        match &self.engine {
            Engine::Poll(engine) => from_poll(&engine.status()),
            Engine::Push(engine) => from_push(&engine.status()),
        }
    }

    /// Returns a watcher that yields normalized status on every change.
    pub fn watch(&self) -> StatusWatch {
        let inner = match &self.engine {
            Engine::Poll(engine) => WatchInner::Poll(engine.subscribe()),
            Engine::Push(engine) => WatchInner::Push(engine.subscribe()),
        };
        StatusWatch { inner }
    }

    /// Takes the completion subscription.
    ///
    /// There is exactly one subscriber; later calls return `None`.
    pub fn completions(&self) -> Option<Completions> {
        self.completions.lock().take().map(|rx| Completions { rx })
    }
}

fn from_poll(status: &PollStatus) -> SyncStatus {
    SyncStatus {
        transport: TransportKind::Poll,
        mode: status.mode,
        error_message: status.last_error.clone(),
        retry_or_reconnect_count: status.retry_count,
    }
}

fn from_push(status: &PushStatus) -> SyncStatus {
    SyncStatus {
        transport: TransportKind::Push,
        mode: if status.running {
            SyncMode::Active
        } else {
            SyncMode::Idle
        },
        error_message: status.last_error.clone(),
        retry_or_reconnect_count: status.reconnect_attempts,
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Ordered, deduplicated stream of completed items.
#[derive(Debug)]
pub struct Completions {
    rx: CompletionReceiver,
}

impl Completions {
    /// Waits for the next completion. `None` once the engine is gone.
    pub async fn next(&mut self) -> Option<CompletedItem> {
        self.rx.recv().await
    }

    /// Returns a completion if one is already queued.
    pub fn try_next(&mut self) -> Option<CompletedItem> {
        self.rx.try_recv().ok()
    }

    /// Converts into a [`Stream`](tokio_stream::Stream).
    pub fn into_stream(self) -> UnboundedReceiverStream<CompletedItem> {
        UnboundedReceiverStream::new(self.rx)
    }
}

enum WatchInner {
    Poll(watch::Receiver<PollStatus>),
    Push(watch::Receiver<PushStatus>),
}

/// Normalized status watcher returned by [`SyncFacade::watch`].
pub struct StatusWatch {
    inner: WatchInner,
}

impl StatusWatch {
    /// Returns the current status.
    pub fn current(&self) -> SyncStatus {
        match &self.inner {
            WatchInner::Poll(rx) => from_poll(&rx.borrow()),
            WatchInner::Push(rx) => from_push(&rx.borrow()),
        }
    }

    /// Waits for the next change and returns the new status.
    pub async fn changed(&mut self) -> SyncResult<SyncStatus> {
        let result = match &mut self.inner {
            WatchInner::Poll(rx) => rx.changed().await,
            WatchInner::Push(rx) => rx.changed().await,
        };
        result.map_err(|_| SyncError::ChannelError("sync engine dropped".into()))?;
        Ok(self.current())
    }

    /// Waits until `predicate` holds and returns the matching status.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> SyncResult<SyncStatus>
    where
        F: FnMut(&SyncStatus) -> bool,
    {
        let current = self.current();
        if predicate(&current) {
            return Ok(current);
        }
        loop {
            let status = self.changed().await?;
            if predicate(&status) {
                return Ok(status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCompletionSource;

    #[tokio::test(start_paused = true)]
    async fn test_poll_facade_lifecycle() {
        let mock = MockCompletionSource::new();
        mock.push_ids(&["a", "b"]);
        let facade = SyncFacade::poll(mock.clone(), PollConfig::default());
        assert_eq!(facade.transport(), TransportKind::Poll);
        assert_eq!(facade.status(), SyncStatus::idle(TransportKind::Poll));

        let mut completions = facade.completions().unwrap();
        assert!(facade.completions().is_none());

        facade.start();
        assert_eq!(facade.status().mode, SyncMode::Active);
        assert_eq!(completions.next().await.unwrap().id.as_str(), "a");
        assert_eq!(completions.next().await.unwrap().id.as_str(), "b");

        facade.stop();
        assert_eq!(facade.status().mode, SyncMode::Idle);
        assert!(!facade.reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_reports_retry_count() {
        let mock = MockCompletionSource::new();
        mock.push_outage(2);
        let facade = SyncFacade::poll(mock, PollConfig::default());
        let mut watch = facade.watch();

        facade.start();
        let status = watch
            .wait_for(|s| s.retry_or_reconnect_count == 2)
            .await
            .unwrap();
        assert_eq!(status.mode, SyncMode::Active);
        assert!(status.error_message.unwrap().contains("health check failed"));

        let status = watch
            .wait_for(|s| s.retry_or_reconnect_count == 0)
            .await
            .unwrap();
        assert!(status.error_message.is_none());
        assert_eq!(facade.status(), status);
    }

    #[test]
    fn test_push_normalization() {
        let status = PushStatus {
            running: true,
            reconnect_attempts: 12,
            last_error: Some("Connection dropped: Server error (code 1011)".into()),
            ..PushStatus::default()
        };
        let normalized = from_push(&status);
        assert_eq!(normalized.mode, SyncMode::Active);
        assert_eq!(normalized.retry_or_reconnect_count, 12);

        let stopped = from_push(&PushStatus::default());
        assert_eq!(stopped.mode, SyncMode::Idle);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let mut config = SyncConfig::default();
        config.server.api_url = "localhost".into();
        let err = SyncFacade::from_config(&config).err().unwrap();
        assert!(err.is_config_error());
    }
}
