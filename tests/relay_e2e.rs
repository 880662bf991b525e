//! End-to-end tests against a real relay on an ephemeral port
//!
//! - Producer → WS /uplink → Hub → GET /listen.mp3 (listener)
//! - Admission control, ack/stats messages, teardown and shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use audio_relay::config::AppConfig;
use audio_relay::network::StatusReporter;
use audio_relay::relay::Hub;
use audio_relay::ui::WebServer;

type Producer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────────

struct Relay {
    addr: SocketAddr,
    hub: Arc<Hub>,
    cancel: CancellationToken,
}

async fn start_relay(config: AppConfig) -> Relay {
    let hub = Arc::new(Hub::with_config(&config.relay));
    let cancel = CancellationToken::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = WebServer::new(config, Arc::clone(&hub), cancel.clone());
    tokio::spawn(server.serve(listener));

    Relay { addr, hub, cancel }
}

async fn connect_producer(addr: SocketAddr) -> Result<Producer, tungstenite::Error> {
    let url = format!("ws://{}/uplink", addr);
    tokio_tungstenite::connect_async(url).await.map(|(stream, _)| stream)
}

/// Next JSON message of the given `type`, skipping anything else
async fn next_json(producer: &mut Producer, kind: &str) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(WAIT, producer.next())
            .await
            .expect("timed out waiting for message")
            .expect("producer stream ended")
            .expect("producer stream failed");
        if let Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["type"] == kind {
                return value;
            }
        }
    }
}

async fn next_text(producer: &mut Producer) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, producer.next())
            .await
            .expect("timed out waiting for message")
            .expect("producer stream ended")
            .expect("producer stream failed");
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn open_listener(addr: SocketAddr) -> reqwest::Response {
    let response = reqwest::Client::new()
        .get(format!("http://{}/listen.mp3", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response
}

/// Read from the listener until `len` bytes have arrived
async fn read_exact(response: &mut reqwest::Response, len: usize) -> Vec<u8> {
    let mut received = Vec::with_capacity(len);
    while received.len() < len {
        let chunk = tokio::time::timeout(WAIT, response.chunk())
            .await
            .expect("timed out waiting for audio")
            .unwrap()
            .expect("audio stream ended early");
        received.extend_from_slice(&chunk);
    }
    received
}

async fn stats(addr: SocketAddr) -> serde_json::Value {
    reqwest::Client::new()
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_frames_reach_listener_in_order() {
    let relay = start_relay(AppConfig::default()).await;
    let mut listener = open_listener(relay.addr).await;
    assert_eq!(relay.hub.listener_count(), 1);

    let mut producer = connect_producer(relay.addr).await.unwrap();
    let frames: Vec<Vec<u8>> = (1..=3u8).map(|i| vec![i; 100]).collect();
    for frame in &frames {
        producer.send(Message::Binary(frame.clone())).await.unwrap();
    }

    let ack = next_json(&mut producer, "ack").await;
    assert_eq!(ack["status"], "streaming_started");
    assert_eq!(ack["listeners"], 1);

    let received = read_exact(&mut listener, 300).await;
    assert_eq!(received, frames.concat());

    let stats = stats(relay.addr).await;
    assert_eq!(stats["bytes_total"], 300);
    assert_eq!(stats["active"], true);
    assert_eq!(stats["listeners"], 1);
    assert!(stats["started_at"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_producer_is_locked_out() {
    let relay = start_relay(AppConfig::default()).await;
    let mut first = connect_producer(relay.addr).await.unwrap();

    match connect_producer(relay.addr).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 423),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("second producer was admitted"),
    }

    first.send(Message::Binary(vec![0xAB; 10])).await.unwrap();
    let ack = next_json(&mut first, "ack").await;
    assert_eq!(ack["listeners"], 0);

    first.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(next_text(&mut first).await, "pong");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_producer_can_reconnect() {
    let relay = start_relay(AppConfig::default()).await;

    let mut first = connect_producer(relay.addr).await.unwrap();
    first.send(Message::Binary(vec![1; 50])).await.unwrap();
    next_json(&mut first, "ack").await;
    first.close(None).await.unwrap();

    let hub = Arc::clone(&relay.hub);
    wait_until(|| !hub.has_producer()).await;
    assert!(!relay.hub.is_active());

    let mut second = connect_producer(relay.addr).await.unwrap();
    second.send(Message::Binary(vec![2; 50])).await.unwrap();
    next_json(&mut second, "ack").await;
    assert_eq!(relay.hub.bytes_total(), 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listener_disconnect_deregisters() {
    let relay = start_relay(AppConfig::default()).await;
    let listener = open_listener(relay.addr).await;
    let other = open_listener(relay.addr).await;
    assert_eq!(relay.hub.listener_count(), 2);

    drop(listener);

    // The relay notices the disconnect on its next write.
    let mut producer = connect_producer(relay.addr).await.unwrap();
    let hub = Arc::clone(&relay.hub);
    let feed = tokio::spawn(async move {
        for _ in 0..1000 {
            if producer.send(Message::Binary(vec![7; 1024])).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        producer
    });

    wait_until(|| hub.listener_count() == 1).await;
    drop(other);
    wait_until(|| hub.listener_count() == 0).await;
    feed.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stats_pushed_after_ack() {
    let mut config = AppConfig::default();
    config.relay.stats_interval_ms = 50;
    let relay = start_relay(config.clone()).await;

    let tracker = TaskTracker::new();
    StatusReporter::new(Arc::clone(&relay.hub), config.relay.stats_interval())
        .spawn(&tracker, relay.cancel.clone());

    let mut producer = connect_producer(relay.addr).await.unwrap();
    let idle = next_json(&mut producer, "stats").await;
    assert_eq!(idle["active"], false);

    producer.send(Message::Binary(vec![9; 64])).await.unwrap();
    let mut saw_ack = false;
    loop {
        let text = next_text(&mut producer).await;
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        match value["type"].as_str() {
            Some("ack") => saw_ack = true,
            Some("stats") if value["active"] == true => {
                assert!(saw_ack, "active stats arrived before the ack");
                assert_eq!(value["bytes_total"], 64);
                break;
            }
            _ => {}
        }
    }

    relay.cancel.cancel();
    tracker.close();
    tokio::time::timeout(WAIT, tracker.wait()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_ends_streams() {
    let relay = start_relay(AppConfig::default()).await;
    let mut listener = open_listener(relay.addr).await;
    let mut producer = connect_producer(relay.addr).await.unwrap();

    producer.send(Message::Binary(Bytes::from_static(b"last words").to_vec())).await.unwrap();
    assert_eq!(read_exact(&mut listener, 10).await, b"last words");

    relay.cancel.cancel();

    let end = tokio::time::timeout(WAIT, listener.chunk()).await.expect("listener not closed");
    assert!(matches!(end, Ok(None) | Err(_)));

    let hub = Arc::clone(&relay.hub);
    wait_until(|| !hub.has_producer()).await;
}
