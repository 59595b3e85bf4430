//! End-to-end tests: a real server on an ephemeral port, driven over
//! `WebSocket` and HTTP.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use vox_auth::{CredentialStore, SqliteCredentialStore};
use vox_broker::{Broker, BrokerConfig};
use vox_core::GroupName;
use vox_server::{ServerConfig, ServerHandle, VoxServer};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "integration-admin-secret";
const WHISPER_KEY: &str = "vk_integration_whisper";

struct Harness {
    handle: ServerHandle,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn start(config: ServerConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCredentialStore::open(&dir.path().join("credentials.db")).unwrap();
        store.issue(WHISPER_KEY, GroupName::Whisper).await.unwrap();
        let broker = Arc::new(Broker::new(BrokerConfig::default(), Arc::new(store)));
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            admin_secret: Some(SECRET.into()),
            ..config
        };
        let handle = VoxServer::new(config, broker).start().await.unwrap();
        Self { handle, _dir: dir }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.handle.addr())
    }

    async fn connect(&self) -> (Ws, String) {
        let (mut ws, _) = connect_async(format!("ws://{}/ws", self.handle.addr()))
            .await
            .unwrap();
        let greeting = next_event(&mut ws).await;
        assert_eq!(greeting["event"], "connected");
        let conn_id = greeting["data"]["connId"].as_str().unwrap().to_owned();
        (ws, conn_id)
    }

    async fn worker(&self, key: &str, group: &str) -> Ws {
        let (mut ws, _) = self.connect().await;
        send(
            &mut ws,
            json!({"event": "identify_worker", "data": {"key": key, "group": group}}),
        )
        .await;
        let ack = next_event(&mut ws).await;
        assert_eq!(ack, json!({"event": "worker_identified", "data": {"group": group}}));
        ws
    }
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn next_event(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Wait until the server closes the socket. Returns any text frames seen.
async fn wait_closed(ws: &mut Ws) -> Vec<Value> {
    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("socket was not closed")
        {
            Some(Ok(Message::Text(text))) => seen.push(serde_json::from_str(text.as_str()).unwrap()),
            Some(Ok(Message::Close(_)) | Err(_)) | None => return seen,
            Some(Ok(_)) => {}
        }
    }
}

async fn wait_for_unbound(harness: &Harness, group: GroupName) {
    for _ in 0..100 {
        if harness.handle.broker().registry().holder_of(group).is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{group} slot was never released");
}

#[tokio::test]
async fn whisper_round_trip_over_websocket() {
    let harness = Harness::start(ServerConfig::default()).await;
    let mut whisper = harness.worker(WHISPER_KEY, "whisper").await;
    let (mut producer, producer_id) = harness.connect().await;

    send(
        &mut producer,
        json!({"event": "audio_request", "data": {"audioFloat32": [0.5, 0.25], "language": "malay-only"}}),
    )
    .await;

    let job = next_event(&mut whisper).await;
    assert_eq!(job["event"], "audio_to_worker");
    assert_eq!(job["data"]["originConnId"], producer_id.as_str());
    assert_eq!(job["data"]["audioFloat32"], json!([0.5, 0.25]));

    send(
        &mut whisper,
        json!({"event": "worker_result", "data": {"transcript": "apa khabar", "targetConnId": producer_id}}),
    )
    .await;
    assert_eq!(
        next_event(&mut producer).await,
        json!({"event": "transcription_result", "data": {"transcript": "apa khabar"}})
    );

    harness.handle.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn missing_worker_reports_unavailable() {
    let harness = Harness::start(ServerConfig::default()).await;
    let (mut producer, _) = harness.connect().await;

    send(
        &mut producer,
        json!({"event": "audio_request", "data": {"audioFloat32": [0.5], "language": "english-only"}}),
    )
    .await;
    assert_eq!(
        next_event(&mut producer).await,
        json!({
            "event": "transcription_error",
            "data": {"message": "Service for 'english-only' is unavailable."}
        })
    );
}

#[tokio::test]
async fn bad_credential_closes_socket() {
    let harness = Harness::start(ServerConfig::default()).await;
    let (mut ws, _) = harness.connect().await;

    send(
        &mut ws,
        json!({"event": "identify_worker", "data": {"key": WHISPER_KEY, "group": "wave2vec"}}),
    )
    .await;
    let frames = wait_closed(&mut ws).await;
    assert!(frames.is_empty());
    assert!(harness.handle.broker().registry().holder_of(GroupName::Wave2vec).is_none());
}

#[tokio::test]
async fn disconnect_releases_worker_slot() {
    let harness = Harness::start(ServerConfig::default()).await;
    let mut whisper = harness.worker(WHISPER_KEY, "whisper").await;
    assert!(harness.handle.broker().registry().holder_of(GroupName::Whisper).is_some());

    whisper.close(None).await.unwrap();
    wait_for_unbound(&harness, GroupName::Whisper).await;
}

#[tokio::test]
async fn connection_cap_refuses_upgrade() {
    let harness = Harness::start(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let (_first, _) = harness.connect().await;

    let refused = connect_async(format!("ws://{}/ws", harness.handle.addr())).await;
    match refused {
        Err(WsError::Http(resp)) => assert_eq!(resp.status(), 503),
        Err(e) => panic!("expected 503, got {e}"),
        Ok(_) => panic!("upgrade beyond the cap was accepted"),
    }
}

#[tokio::test]
async fn concurrent_upgrades_respect_the_cap() {
    let harness = Harness::start(ServerConfig {
        max_connections: 2,
        ..ServerConfig::default()
    })
    .await;
    let url = format!("ws://{}/ws", harness.handle.addr());

    let attempts = (0..8).map(|_| connect_async(url.clone()));
    let results = futures::future::join_all(attempts).await;
    let mut accepted = Vec::new();
    for result in results {
        match result {
            Ok((ws, _)) => accepted.push(ws),
            Err(WsError::Http(resp)) => assert_eq!(resp.status(), 503),
            Err(e) => panic!("unexpected handshake error: {e}"),
        }
    }
    assert_eq!(accepted.len(), 2);

    // Closing one frees its slot.
    let mut closing = accepted.pop().unwrap();
    closing.close(None).await.unwrap();
    drop(closing);
    let mut reopened = None;
    for _ in 0..50 {
        if let Ok((ws, _)) = connect_async(url.clone()).await {
            reopened = Some(ws);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reopened.is_some());
}

#[tokio::test]
async fn silent_client_is_dropped_by_heartbeat() {
    let harness = Harness::start(ServerConfig {
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_millis(150),
        ..ServerConfig::default()
    })
    .await;
    // Never polling the stream means pings are never answered.
    let (_idle, _) = harness.connect().await;

    for _ in 0..100 {
        if harness.handle.broker().connections().count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("idle connection was not closed");
}

#[tokio::test]
async fn admin_issued_key_identifies_worker() {
    let harness = Harness::start(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(harness.http("/admin/keys"))
        .json(&json!({"group": "store", "adminSecret": SECRET}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let key = body["apiKey"].as_str().unwrap().to_owned();

    let _store = harness.worker(&key, "store").await;

    let health: Value = client
        .get(harness.http("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["workers"][2], json!({"group": "store", "bound": true}));

    let denied = client
        .post(harness.http("/admin/keys"))
        .json(&json!({"group": "store", "adminSecret": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);
}
