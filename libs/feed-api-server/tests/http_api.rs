use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use feed_api::{FeedError, HistorySource, TokenTransfer, TransportKind, UpstreamEvent};
use feed_api_server::{router, AppState};
use feed_engine::{Broadcaster, ReadService, TransactionStore};

struct StubHistory(Vec<UpstreamEvent>);

impl HistorySource for StubHistory {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<UpstreamEvent>, FeedError>> + Send + '_>> {
        let events = self.0.clone();
        Box::pin(async move { Ok(events) })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct TestServer {
    addr: SocketAddr,
    http: reqwest::Client,
    broadcaster: Arc<Broadcaster>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn ingest(&self, body: Value) -> reqwest::Response {
        self.http.post(self.url("/ingest")).json(&body).send().await.unwrap()
    }

    async fn transactions(&self, query: &str) -> Vec<Value> {
        self.http
            .get(self.url(&format!("/transactions{query}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn connections(&self) -> u64 {
        let stats: Value = self
            .http
            .get(self.url("/api/stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        stats["connections"].as_u64().unwrap()
    }
}

async fn start(history: Option<Arc<dyn HistorySource>>) -> TestServer {
    let store = Arc::new(TransactionStore::new(50));
    let broadcaster = Arc::new(Broadcaster::default());
    let reader = ReadService::new(store.clone(), history);
    let state = AppState::new(store, broadcaster.clone(), reader, 64).unwrap();
    let app = router(state, &[TransportKind::Sse, TransportKind::WebSocket]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        http: reqwest::Client::new(),
        broadcaster,
    }
}

fn event(sig: &str, ts: i64) -> Value {
    json!({
        "signature": sig,
        "timestamp": ts,
        "type": "TRANSFER",
        "tokenTransfers": [{"fromUserAccount": "A", "toUserAccount": "B", "tokenAmount": 5}]
    })
}

#[tokio::test]
async fn ingest_then_read_returns_flattened_record() {
    let server = start(None).await;

    let resp = server
        .ingest(json!([{
            "signature": "sig1",
            "timestamp": 1000,
            "type": "transfer",
            "tokenTransfers": [{"fromUserAccount": "A", "toUserAccount": "B", "tokenAmount": 5}]
        }]))
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["message"], "Webhook processed successfully");
    assert_eq!(ack["processedCount"], 1);
    assert_eq!(ack["totalStoredTransactions"], 1);

    let records = server.transactions("").await;
    assert_eq!(
        records,
        vec![json!({"signature":"sig1","timestamp":1000,"amount":5.0,"type":"transfer","from":"A","to":"B"})]
    );
}

#[tokio::test]
async fn fifty_one_records_evict_the_oldest() {
    let server = start(None).await;
    for i in 1..=51 {
        let resp = server.ingest(json!([event(&format!("s{i}"), i)])).await;
        assert_eq!(resp.status(), 200);
    }

    let records = server.transactions("?type=recent").await;
    assert_eq!(records.len(), 50);
    assert!(records.iter().all(|r| r["signature"] != "s1"));
    assert_eq!(records[0]["signature"], "s51");
}

#[tokio::test]
async fn empty_transfer_list_yields_defaults() {
    let server = start(None).await;
    server
        .ingest(json!([{"signature": "bare", "timestamp": 3, "type": "SWAP", "tokenTransfers": []}]))
        .await;
    let records = server.transactions("?type=recent").await;
    assert_eq!(records[0]["amount"], 0.0);
    assert_eq!(records[0]["from"], "");
    assert_eq!(records[0]["to"], "");
}

#[tokio::test]
async fn fractional_timestamp_does_not_fail_the_batch() {
    let server = start(None).await;
    let resp = server
        .ingest(json!([
            {"signature": "whole", "timestamp": 1000, "type": "TRANSFER", "tokenTransfers": []},
            {"signature": "frac", "timestamp": 1000.5, "type": "TRANSFER", "tokenTransfers": []}
        ]))
        .await;
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["processedCount"], 2);

    let records = server.transactions("?type=recent").await;
    assert_eq!(records[0]["signature"], "frac");
    assert_eq!(records[0]["timestamp"], json!(1000.5));
    assert_eq!(records[1]["timestamp"], json!(1000));

    let merged = server.transactions("").await;
    assert_eq!(merged[0]["signature"], "frac");
}

#[tokio::test]
async fn wrong_methods_are_rejected() {
    let server = start(None).await;

    let resp = server.http.get(server.url("/ingest")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Method not allowed");

    let resp = server.http.post(server.url("/transactions")).send().await.unwrap();
    assert_eq!(resp.status(), 405);

    let resp = server.http.delete(server.url("/updates")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
}

#[tokio::test]
async fn malformed_body_fails_whole_batch() {
    let server = start(None).await;
    server.ingest(json!([event("keep", 1)])).await;

    let resp = server.ingest(json!({"signature": "not-an-array"})).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Internal server error");
    assert!(body["error"].as_str().unwrap().contains("array"));

    let resp = server
        .http
        .post(server.url("/ingest"))
        .body("[{\"signature\":\"half\"}, ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let records = server.transactions("").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["signature"], "keep");
}

#[tokio::test]
async fn merged_read_deduplicates_against_history() {
    let history = StubHistory(vec![
        UpstreamEvent {
            signature: Some("dup".into()),
            timestamp: Some(2000.into()),
            kind: Some("TRANSFER".into()),
            token_transfers: Some(vec![TokenTransfer {
                from_user_account: Some("H".into()),
                to_user_account: Some("I".into()),
                token_amount: Some(1.0),
            }]),
        },
        UpstreamEvent {
            signature: Some("old".into()),
            timestamp: Some(10.into()),
            ..Default::default()
        },
    ]);
    let history: Arc<dyn HistorySource> = Arc::new(history);
    let server = start(Some(history)).await;
    server.ingest(json!([event("dup", 1000), event("local", 1500)])).await;

    let merged = server.transactions("").await;
    let sigs: Vec<_> = merged.iter().map(|r| r["signature"].as_str().unwrap()).collect();
    assert_eq!(sigs, ["dup", "local", "old"]);
    assert_eq!(merged[0]["timestamp"], 2000);
    assert_eq!(merged[0]["from"], "H");

    let limited = server.transactions("?limit=1").await;
    assert_eq!(limited.len(), 1);

    let recent = server.transactions("?type=recent").await;
    let sigs: Vec<_> = recent.iter().map(|r| r["signature"].as_str().unwrap()).collect();
    assert_eq!(sigs, ["local", "dup"]);
}

#[tokio::test]
async fn preflight_is_answered() {
    let server = start(None).await;
    let resp = server
        .http
        .request(reqwest::Method::OPTIONS, server.url("/ingest"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
    assert!(resp
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("POST"));
}

/// Read SSE chunks until the accumulated text contains `needle`.
async fn read_until(resp: &mut reqwest::Response, buf: &mut String, needle: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !buf.contains(needle) {
            let chunk = resp.chunk().await.unwrap().expect("stream ended early");
            buf.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .expect("timed out waiting for sse data");
}

#[tokio::test]
async fn sse_stream_handshakes_and_receives_batches() {
    let server = start(None).await;
    let mut resp = server.http.get(server.url("/updates")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut buf = String::new();
    read_until(&mut resp, &mut buf, r#"data: {"type":"connected"}"#).await;
    assert_eq!(server.connections().await, 1);

    server.ingest(json!([event("live1", 1), event("live2", 2)])).await;
    read_until(&mut resp, &mut buf, "new-transactions").await;
    read_until(&mut resp, &mut buf, "live2").await;
    assert!(buf.contains("live1"));

    let report = server.broadcaster.keep_alive();
    assert_eq!(report.delivered, 1);
    read_until(&mut resp, &mut buf, ": keep-alive\n\n").await;

    // A dead SSE peer is only noticed once a write to it fails.
    drop(resp);
    for i in 0..50 {
        if server.connections().await == 0 {
            return;
        }
        server.ingest(json!([event(&format!("tick{i}"), 3)])).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sse connection was never released");
}

#[tokio::test]
async fn websocket_handshakes_and_receives_batches() {
    let server = start(None).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    let first = next_text(&mut socket).await;
    assert_eq!(first, json!({"type": "connected"}));

    server.ingest(json!([event("ws1", 7)])).await;
    let update = next_text(&mut socket).await;
    assert_eq!(update["type"], "new-transactions");
    assert_eq!(update["transactions"][0]["signature"], "ws1");
    assert_eq!(update["transactions"][0]["amount"], 5.0);

    assert_eq!(server.broadcaster.keep_alive().delivered, 1);
    let ping = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for ping")
        .expect("socket closed")
        .unwrap();
    assert!(matches!(ping, Message::Ping(ref payload) if payload.is_empty()));

    socket.close(None).await.unwrap();
    wait_for_connections(&server, 0).await;
}

async fn next_text<S>(socket: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await.expect("socket closed").unwrap() {
                Message::Text(t) => return serde_json::from_str::<Value>(t.as_str()).unwrap(),
                _ => continue,
            }
        }
    })
    .await
    .expect("timed out waiting for websocket text")
}

async fn wait_for_connections(server: &TestServer, expected: u64) {
    for _ in 0..50 {
        if server.connections().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("connection count never reached {expected}");
}
