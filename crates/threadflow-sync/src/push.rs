//! # Push Sync Engine
//!
//! Receives completions over a long-lived WebSocket and reconnects forever
//! with backoff when the connection drops.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    WebSocket Connection States                          │
//! │                                                                         │
//! │  ┌────────────┐    start()      ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘                 └─────┬──────┘                         │
//! │        ▲                              │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           │                           │
//! │        │              ┌────────────┐        │                           │
//! │        │              │ Connected  │        │                           │
//! │        │              │ attempts=0 │        │                           │
//! │        │              │ send ping  │        │                           │
//! │        │              └─────┬──────┘        │                           │
//! │        │     close / error /│               │                           │
//! │        │     ping failure / │               │                           │
//! │        │     reconnect()    ▼               ▼                           │
//! │        │              ┌──────────────────────────┐                     │
//! │        └───────────── │ attempts += 1            │                     │
//! │          after delay  │ wait backoff(attempts)   │                     │
//! │                       └──────────────────────────┘                     │
//! │                                                                         │
//! │  There is no attempt ceiling: the engine never gives up on its own.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use threadflow_core::BackoffPolicy;
use tokio::net::TcpStream;
use tokio::sync::futures::Notified;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::delivery::CompletionSink;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{close_reason, ClientMessage, ServerMessage, ABNORMAL_CLOSURE};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;

/// Close code reported when the server closes without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Push engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PushConfig {
    /// WebSocket URL (ws:// or wss://).
    pub url: String,

    /// Upper bound for opening the connection.
    pub connect_timeout: Duration,

    /// Period between keepalive pings while connected.
    pub keepalive_interval: Duration,

    /// Delay schedule between reconnects.
    pub backoff: BackoffPolicy,
}

impl Default for PushConfig {
    fn default() -> Self {
        PushConfig {
            url: "ws://localhost:8082".to_string(),
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Snapshot of the push engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushStatus {
    /// True between `start()` and `stop()`.
    pub running: bool,

    pub connection: ConnectionState,

    /// Drops since the last successful open.
    pub reconnect_attempts: u32,

    pub last_error: Option<String>,

    /// When the server last acknowledged a keepalive.
    pub last_pong: Option<DateTime<Utc>>,

    /// Delay before the pending reconnect, if one is scheduled.
    pub next_delay: Option<Duration>,
}

struct PushState {
    status: PushStatus,
    generation: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct PushShared {
    config: PushConfig,
    sink: CompletionSink,
    state: Mutex<PushState>,
    status_tx: watch::Sender<PushStatus>,
    reconnect: Notify,
}

// =============================================================================
// Reconnect Backoff
// =============================================================================

/// Attempt-indexed [`Backoff`] over a [`BackoffPolicy`].
///
/// Each `next_backoff` call counts one more drop and returns
/// `policy.compute_delay(attempts)`; it never returns `None`.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl ReconnectBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        ReconnectBackoff {
            policy,
            attempts: 0,
        }
    }

    /// Drops counted since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Backoff for ReconnectBackoff {
    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        Some(self.policy.compute_delay(self.attempts))
    }
}

// =============================================================================
// Engine
// =============================================================================

/// WebSocket push engine.
///
/// Must be started from within a Tokio runtime. Dropping the engine closes
/// the connection.
pub struct PushSyncEngine {
    shared: Arc<PushShared>,
}

impl PushSyncEngine {
    /// Creates an idle engine.
    pub fn new(config: PushConfig, sink: CompletionSink) -> Self {
        let status = PushStatus::default();
        let (status_tx, _) = watch::channel(status.clone());
        PushSyncEngine {
            shared: Arc::new(PushShared {
                config,
                sink,
                state: Mutex::new(PushState {
                    status,
                    generation: 0,
                    cancel: CancellationToken::new(),
                    task: None,
                }),
                status_tx,
                reconnect: Notify::new(),
            }),
        }
    }

    /// Opens the connection. No-op while already running.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        if state.status.running {
            debug!("Push engine already running");
            return;
        }
        info!(url = %self.shared.config.url, "Starting push engine");
        self.launch(&mut state);
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if !state.status.running {
            return;
        }
        state.generation += 1;
        state.cancel.cancel();
        state.status.running = false;
        state.status.connection = ConnectionState::Disconnected;
        state.status.next_delay = None;
        info!("Push engine stopped");
        self.shared.publish(&state);
    }

    /// Clears the reconnect counter and error, then connects afresh.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.cancel.cancel();
        state.status.reconnect_attempts = 0;
        state.status.last_error = None;
        info!("Push engine reset");
        self.launch(&mut state);
    }

    /// Force-closes the live connection; the normal drop handling reconnects.
    ///
    /// Has no effect while no connection is open.
    pub fn reconnect(&self) {
        info!("Manual reconnect requested");
        self.shared.reconnect.notify_waiters();
    }

    /// Returns the latest snapshot.
    pub fn status(&self) -> PushStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PushStatus> {
        self.shared.status_tx.subscribe()
    }

    fn launch(&self, state: &mut PushState) {
        state.generation += 1;
        state.status.running = true;
        state.status.connection = ConnectionState::Disconnected;
        state.status.next_delay = None;

        let cancel = CancellationToken::new();
        state.cancel = cancel.clone();

        let previous = state.task.take();
        let shared = Arc::clone(&self.shared);
        let generation = state.generation;
        state.task = Some(tokio::spawn(run_connection(shared, generation, cancel, previous)));

        self.shared.publish(state);
    }
}

impl Drop for PushSyncEngine {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.cancel.cancel();
    }
}

// =============================================================================
// Connection Loop
// =============================================================================

async fn run_connection(
    shared: Arc<PushShared>,
    generation: u64,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    let mut backoff = ReconnectBackoff::new(shared.config.backoff);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        shared.update(generation, |status| {
            status.connection = ConnectionState::Connecting;
            status.next_delay = None;
        });

        let opened = tokio::select! {
            result = open(&shared.config) => result,
            _ = cancel.cancelled() => break,
        };

        let cause = match opened {
            Ok(stream) => {
                info!(url = %shared.config.url, "WebSocket connected");
                backoff.reset();
                // Registered before Connected is published so no reconnect() is missed.
                let reconnect = shared.reconnect.notified();
                shared.update(generation, |status| {
                    status.connection = ConnectionState::Connected;
                    status.reconnect_attempts = 0;
                    status.last_error = None;
                });

                match shared
                    .connection_loop(stream, generation, &cancel, reconnect)
                    .await
                {
                    Some(cause) => cause,
                    None => break,
                }
            }
            Err(err) => err,
        };

        if cancel.is_cancelled() {
            break;
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or_else(|| shared.config.backoff.max_delay());
        let attempt = backoff.attempts();
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %cause,
            "WebSocket connection lost, reconnecting"
        );
        shared.update(generation, |status| {
            status.connection = ConnectionState::Disconnected;
            status.reconnect_attempts = attempt;
            status.last_error = Some(cause.to_string());
            status.next_delay = Some(delay);
        });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => break,
        }
    }

    debug!(generation, "Push connection task finished");
}

/// Opens the WebSocket within the configured timeout.
async fn open(config: &PushConfig) -> SyncResult<WsStream> {
    match timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, response))) => {
            debug!(status = ?response.status(), "WebSocket handshake complete");
            Ok(stream)
        }
        Ok(Err(e)) => Err(SyncError::from(e)),
        Err(_) => Err(SyncError::TransportDropped(format!(
            "connect timed out after {}s",
            config.connect_timeout.as_secs()
        ))),
    }
}

async fn send_ping(writer: &mut WsWriter) -> SyncResult<()> {
    let json = ClientMessage::Ping.to_json()?;
    writer.send(WsMessage::Text(json.into())).await?;
    debug!("Sent keepalive");
    Ok(())
}

impl PushShared {
    /// Runs one open connection until it drops (`Some(cause)`) or the
    /// engine is stopped (`None`).
    async fn connection_loop(
        &self,
        stream: WsStream,
        generation: u64,
        cancel: &CancellationToken,
        reconnect: Notified<'_>,
    ) -> Option<SyncError> {
        let (mut writer, mut reader) = stream.split();
        tokio::pin!(reconnect);

        if let Err(e) = send_ping(&mut writer).await {
            return Some(e);
        }

        let period = self.config.keepalive_interval;
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = writer.send(WsMessage::Close(None)).await;
                    return None;
                }

                _ = &mut reconnect => {
                    let _ = writer.send(WsMessage::Close(None)).await;
                    return Some(SyncError::TransportDropped("closed for manual reconnect".into()));
                }

                _ = keepalive.tick() => {
                    if let Err(e) = send_ping(&mut writer).await {
                        return Some(e);
                    }
                }

                frame = reader.next() => match frame {
                    None => {
                        return Some(SyncError::TransportDropped(close_reason(ABNORMAL_CLOSURE, "")));
                    }
                    Some(Err(e)) => return Some(SyncError::from(e)),
                    Some(Ok(WsMessage::Text(text))) => self.handle_text(generation, text.as_str()),
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = writer.send(WsMessage::Pong(data)).await {
                            return Some(SyncError::from(e));
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = match frame {
                            Some(frame) => close_reason(u16::from(frame.code), frame.reason.as_str()),
                            None => close_reason(NO_STATUS_RECEIVED, ""),
                        };
                        info!(%reason, "Server closed the connection");
                        return Some(SyncError::TransportDropped(reason));
                    }
                    Some(Ok(WsMessage::Binary(_))) => warn!("Ignoring binary frame"),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let message = match ServerMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed frame");
                return;
            }
        };
        debug!(kind = message.type_name(), "Received frame");

        match message {
            ServerMessage::Pong { .. } => {
                debug!("Received pong");
                self.update(generation, |status| status.last_pong = Some(Utc::now()));
            }
            ServerMessage::Unknown => debug!("Ignoring unrecognised frame"),
            completion @ ServerMessage::TaskComplete { .. } => {
                let state = self.state.lock();
                if state.generation != generation || !state.status.running {
                    return;
                }
                if let Some(item) = completion.into_completion() {
                    self.sink.deliver(item);
                }
            }
        }
    }

    /// Mutates the status if `generation` is still current.
    fn update<F>(&self, generation: u64, apply: F)
    where
        F: FnOnce(&mut PushStatus),
    {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        apply(&mut state.status);
        self.publish(&state);
    }

    fn publish(&self, state: &PushState) {
        self.status_tx.send_replace(state.status.clone());
    }
}
