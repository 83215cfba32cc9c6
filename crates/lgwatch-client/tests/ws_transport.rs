//! End-to-end run against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lgwatch_client::{ConnectionState, Orchestrator, WsConnector};
use lgwatch_core::Identity;
use lgwatch_notify::RecordingNotifier;
use lgwatch_settings::{EndpointSettings, WatchSettings};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

const ALICE_HI: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m1","sender":{"uid":"42","name":"Alice"},"content":"hi"}}"#;
const BOB_YO: &str = r#"{"_ws_type":"server_broadcast","message":{"id":"m2","sender":{"uid":"43","name":"Bob"},"content":"yo"}}"#;

/// What the server saw on one connection.
struct Seen {
    cookie: Option<String>,
    origin: Option<String>,
    join: Value,
}

/// Serves two connections: the first sends m1 twice and closes, the second
/// sends m1 again plus m2 and stays open.
async fn serve(listener: TcpListener, seen: mpsc::UnboundedSender<Seen>) {
    for round in 0..2 {
        let (stream, _) = listener.accept().await.unwrap();
        let (headers_tx, headers_rx) = std::sync::mpsc::channel();
        let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            headers_tx.send((header("cookie"), header("origin"))).unwrap();
            Ok(resp)
        })
        .await
        .unwrap();
        let (cookie, origin) = headers_rx.recv().unwrap();

        let join = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected join text frame, got {other:?}"),
        };
        seen.send(Seen { cookie, origin, join }).unwrap();

        if round == 0 {
            ws.send(Message::Text(ALICE_HI.to_owned().into())).await.unwrap();
            ws.send(Message::Text(ALICE_HI.to_owned().into())).await.unwrap();
            ws.close(None).await.unwrap();
        } else {
            ws.send(Message::Text(ALICE_HI.to_owned().into())).await.unwrap();
            ws.send(Message::Binary(BOB_YO.as_bytes().to_vec().into())).await.unwrap();
            // Hold the connection until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        }
    }
}

async fn wait_for(recorder: &RecordingNotifier, count: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while recorder.count() < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("notifications did not arrive in time");
}

#[tokio::test]
async fn watches_reconnects_and_deduplicates_over_a_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve(listener, seen_tx));

    let mut settings = WatchSettings::default();
    settings.endpoint = EndpointSettings {
        url: format!("ws://127.0.0.1:{port}/ws"),
        ..EndpointSettings::default()
    };
    settings.timing.reconnect_backoff_ms = 50;

    let recorder = RecordingNotifier::new();
    let orchestrator = Orchestrator::new(
        Arc::new(WsConnector::new(settings.endpoint.clone())),
        Arc::new(Identity::new("abc123", "7").unwrap()),
        Arc::new(recorder.clone()),
        &settings,
    );
    let (handle, task) = orchestrator.spawn();

    // Startup notice, then Alice once and Bob once.
    wait_for(&recorder, 3).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    for _ in 0..2 {
        let seen = seen_rx.recv().await.unwrap();
        assert_eq!(seen.cookie.as_deref(), Some("__client_id=abc123; _uid=7"));
        assert_eq!(seen.origin.as_deref(), Some("https://www.luogu.com.cn"));
        assert_eq!(seen.join["type"], "join_channel");
        assert_eq!(seen.join["channel"], "chat");
        assert_eq!(seen.join["channel_param"], "7");
        assert!(seen.join["exclusive_key"].is_null());
    }

    handle.stop();
    let stats = task.await.unwrap();
    server.await.unwrap();

    let bodies: Vec<String> = recorder.notifications().into_iter().map(|n| n.body).collect();
    assert_eq!(
        bodies,
        vec!["洛谷私信监控已启动", "Alice: hi", "Bob: yo", "洛谷私信监控已停止"]
    );
    assert_eq!(stats.sessions_opened, 2);
    assert_eq!(stats.duplicates_suppressed, 2);
    assert_eq!(handle.state(), ConnectionState::Stopping);
}
