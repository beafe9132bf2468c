//! End-to-end push channel tests against a local axum WebSocket server.

#![cfg(feature = "websocket")]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use infrawatch_core::{BackoffConfig, EventBus, EventKind, ListenerHandle};
use infrawatch_transport::{ChannelOptions, ConnectionManager, ConnectionState, WsConnector};
use tokio::sync::mpsc;

fn alert_frame(id: &str) -> String {
    format!(
        r#"{{"type":"alert","data":{{"id":"{id}","title":"Disk","severity":"critical","status":"active","source":"db-1","created_at":"2024-05-01T12:00:00"}}}}"#
    )
}

/// First connection: greet, push one alert, hang up. Later connections:
/// greet, push one alert, answer pings until the client leaves.
async fn ws_handler(ws: WebSocketUpgrade, State(accepted): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    let nth = accepted.fetch_add(1, Ordering::SeqCst) + 1;
    ws.on_upgrade(move |socket| serve(socket, nth))
}

async fn serve(mut socket: WebSocket, nth: usize) {
    let greeting = r#"{"type":"connected","data":{"message":"Connected to InfraWatch"}}"#;
    if socket.send(Message::Text(greeting.into())).await.is_err() {
        return;
    }
    let alert = alert_frame(&format!("alert-{nth}"));
    if socket.send(Message::Text(alert.into())).await.is_err() {
        return;
    }
    if nth == 1 {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if text.as_str().contains("ping") {
                let pong = r#"{"type":"pong","data":{}}"#;
                if socket.send(Message::Text(pong.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn spawn_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let accepted = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(Arc::clone(&accepted));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, accepted)
}

fn fast_options() -> ChannelOptions {
    ChannelOptions {
        backoff: BackoffConfig {
            base: Duration::from_millis(50),
            factor: 1.5,
            max: Duration::from_millis(500),
        },
        keepalive_interval: Duration::from_millis(100),
        max_frame_bytes: 64 * 1024,
    }
}

#[tokio::test]
async fn test_receives_events_and_reconnects_after_server_close() {
    let (addr, accepted) = spawn_server().await;
    let bus = Arc::new(EventBus::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let alerts = ListenerHandle::alerts(move |alert| {
        let _ = tx.send(alert.id.clone());
    });
    bus.subscribe(EventKind::Alert, &alerts);

    let manager = ConnectionManager::new(
        Arc::new(WsConnector::new(format!("ws://{addr}/ws"))),
        Arc::clone(&bus),
        fast_options(),
    );
    manager.connect();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some("alert-1"));
    assert_eq!(second.as_deref(), Some("alert-2"));
    assert_eq!(accepted.load(Ordering::SeqCst), 2);

    let mut states = manager.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ConnectionState::Open),
    )
    .await
    .unwrap()
    .unwrap();

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_keepalive_pong_is_dispatched() {
    let (addr, _accepted) = spawn_server().await;
    let bus = Arc::new(EventBus::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.subscribe(
        EventKind::Pong,
        &ListenerHandle::new(move |_| {
            let _ = tx.send(());
        }),
    );

    let manager = ConnectionManager::new(
        Arc::new(WsConnector::new(format!("ws://{addr}/ws"))),
        Arc::clone(&bus),
        fast_options(),
    );
    manager.connect();

    // The first connection is dropped by the server; the second answers pings.
    let pong = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert_eq!(pong, Some(()));
    manager.disconnect().await;
}
