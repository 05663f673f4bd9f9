//! Push engine behaviour against an in-process axum WebSocket server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use threadflow_core::BackoffPolicy;
use threadflow_sync::{
    CompletionReceiver, CompletionSink, ConnectionState, PushConfig, PushStatus, PushSyncEngine,
    SyncFacade, SyncMode,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const WAIT: Duration = Duration::from_secs(10);

/// Server-side script: what to do on the n-th connection (0-based).
#[derive(Clone, Copy)]
enum Behaviour {
    /// Send `frames` then close with `code`.
    SendThenClose(&'static [&'static str], u16),
    /// Send `frames` then keep reading until the client leaves.
    SendThenHold(&'static [&'static str]),
}

#[derive(Clone)]
struct Server {
    script: Arc<Vec<Behaviour>>,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

async fn upgrade(ws: WebSocketUpgrade, State(server): State<Server>) -> Response {
    ws.on_upgrade(move |socket| handle(socket, server))
}

async fn handle(mut socket: WebSocket, server: Server) {
    let index = server.connections.fetch_add(1, Ordering::SeqCst);
    let behaviour = server
        .script
        .get(index)
        .or_else(|| server.script.last())
        .copied()
        .unwrap_or(Behaviour::SendThenHold(&[]));

    let frames = match behaviour {
        Behaviour::SendThenClose(frames, _) | Behaviour::SendThenHold(frames) => frames,
    };
    for frame in frames {
        if socket.send(Message::Text((*frame).into())).await.is_err() {
            return;
        }
    }

    match behaviour {
        Behaviour::SendThenClose(_, code) => {
            // Give the client's opening ping a moment to arrive.
            if let Ok(Some(Ok(Message::Text(text)))) =
                tokio::time::timeout(Duration::from_millis(500), socket.recv()).await
            {
                server.received.lock().await.push(text.to_string());
            }
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: "".into(),
                })))
                .await;
        }
        Behaviour::SendThenHold(_) => {
            while let Some(Ok(message)) = socket.recv().await {
                match message {
                    Message::Text(text) => {
                        let text = text.to_string();
                        if text.contains("ping") {
                            let _ = socket
                                .send(Message::Text(r#"{"type":"pong","timestamp":1}"#.into()))
                                .await;
                        }
                        server.received.lock().await.push(text);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn serve(script: Vec<Behaviour>) -> (SocketAddr, Server) {
    let server = Server {
        script: Arc::new(script),
        connections: Arc::new(AtomicUsize::new(0)),
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/ws", get(upgrade))
        .with_state(server.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, server)
}

fn fast_config(addr: SocketAddr) -> PushConfig {
    PushConfig {
        url: format!("ws://{}/ws", addr),
        connect_timeout: Duration::from_secs(2),
        keepalive_interval: Duration::from_secs(30),
        backoff: BackoffPolicy::new(
            Duration::from_millis(20),
            1.5,
            Duration::from_millis(100),
            10,
        ),
    }
}

fn engine(config: PushConfig) -> (PushSyncEngine, CompletionReceiver) {
    let (sink, rx) = CompletionSink::channel();
    (PushSyncEngine::new(config, sink), rx)
}

async fn wait_until(engine: &PushSyncEngine, predicate: impl FnMut(&PushStatus) -> bool) {
    let mut rx = engine.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for push status")
        .unwrap();
}

async fn next_id(rx: &mut CompletionReceiver) -> String {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for completion")
        .unwrap()
        .id
        .into_inner()
}

const X: &str = r#"{"type":"task_complete","task_id":"x","status":"completed","timestamp":1700000000}"#;
const Y: &str = r#"{"type":"task_complete","task_id":"y","status":"completed","timestamp":1700000001}"#;

#[tokio::test]
async fn test_redelivered_event_after_reconnect_is_suppressed() {
    let (addr, server) = serve(vec![
        Behaviour::SendThenClose(&[X], 1012),
        Behaviour::SendThenHold(&[X, Y]),
    ])
    .await;
    let (engine, mut rx) = engine(fast_config(addr));

    engine.start();
    assert_eq!(next_id(&mut rx).await, "x");
    // "x" is sent again before "y" on the second connection.
    assert_eq!(next_id(&mut rx).await, "y");
    assert!(rx.try_recv().is_err());

    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
    wait_until(&engine, |s| s.connection == ConnectionState::Connected).await;
    assert_eq!(engine.status().reconnect_attempts, 0);
    engine.stop();
}

#[tokio::test]
async fn test_sends_ping_on_open_and_tracks_pong() {
    let (addr, server) = serve(vec![Behaviour::SendThenHold(&[])]).await;
    let (engine, _rx) = engine(fast_config(addr));

    engine.start();
    wait_until(&engine, |s| s.last_pong.is_some()).await;

    let received = server.received.lock().await.clone();
    assert_eq!(received.first().map(String::as_str), Some(r#"{"type":"ping"}"#));
    engine.stop();
}

#[tokio::test]
async fn test_keepalive_repeats_on_period() {
    let (addr, server) = serve(vec![Behaviour::SendThenHold(&[])]).await;
    let (engine, _rx) = engine(PushConfig {
        keepalive_interval: Duration::from_millis(50),
        ..fast_config(addr)
    });

    engine.start();
    tokio::time::timeout(WAIT, async {
        while server.received.lock().await.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(server
        .received
        .lock()
        .await
        .iter()
        .all(|frame| frame == r#"{"type":"ping"}"#));
    engine.stop();
}

#[tokio::test]
async fn test_close_code_reported_in_last_error() {
    let (addr, _server) = serve(vec![Behaviour::SendThenClose(&[], 1011)]).await;
    let (engine, _rx) = engine(PushConfig {
        backoff: BackoffPolicy::new(
            Duration::from_millis(200),
            1.0,
            Duration::from_millis(200),
            0,
        ),
        ..fast_config(addr)
    });

    engine.start();
    wait_until(&engine, |s| {
        s.last_error
            .as_deref()
            .is_some_and(|e| e.contains("Server error (code 1011)"))
    })
    .await;
    assert!(engine.status().running);
    engine.stop();
}

#[tokio::test]
async fn test_reconnects_forever_when_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (sink, rx) = CompletionSink::channel();
    let facade = SyncFacade::with_push_engine(
        PushSyncEngine::new(
            PushConfig {
                backoff: BackoffPolicy::new(
                    Duration::from_millis(5),
                    1.5,
                    Duration::from_millis(10),
                    10,
                ),
                ..fast_config(addr)
            },
            sink,
        ),
        rx,
    );
    let mut watch = facade.watch();

    facade.start();
    let status = tokio::time::timeout(WAIT, watch.wait_for(|s| s.retry_or_reconnect_count >= 8))
        .await
        .unwrap()
        .unwrap();

    // Past any poll-style ceiling, still trying.
    assert_eq!(status.mode, SyncMode::Active);
    assert!(status.error_message.is_some());
    facade.stop();
    assert_eq!(facade.status().mode, SyncMode::Idle);
}

#[tokio::test]
async fn test_manual_reconnect_opens_new_connection() {
    let (addr, server) = serve(vec![Behaviour::SendThenHold(&[])]).await;
    let (engine, _rx) = engine(fast_config(addr));

    engine.start();
    wait_until(&engine, |s| s.connection == ConnectionState::Connected).await;
    engine.reconnect();

    tokio::time::timeout(WAIT, async {
        while server.connections.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    wait_until(&engine, |s| {
        s.connection == ConnectionState::Connected && s.reconnect_attempts == 0
    })
    .await;
    engine.stop();
}

#[tokio::test]
async fn test_stop_discards_later_events() {
    let (addr, server) = serve(vec![Behaviour::SendThenHold(&[X])]).await;
    let (engine, mut rx) = engine(fast_config(addr));

    engine.start();
    assert_eq!(next_id(&mut rx).await, "x");
    engine.stop();

    let status = engine.status();
    assert!(!status.running);
    assert_eq!(status.connection, ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}
