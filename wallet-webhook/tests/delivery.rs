//! End-to-end delivery behaviour through the HTTP ingress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde::Deserialize;
use tower::ServiceExt;

use wallet_webhook::{register_handler, Options, RawEvent, Webhook};

#[derive(Debug, Deserialize)]
struct Ping {
    seq: u64,
}

/// Handler payload that keeps its worker busy for a while.
#[derive(Debug, Deserialize)]
struct Slow {
    millis: u64,
}

fn webhook(options: Options) -> Webhook {
    Webhook::new("http://localhost:8080/webhook", options).unwrap()
}

fn pings(seqs: impl IntoIterator<Item = u64>) -> String {
    let events: Vec<RawEvent> = seqs
        .into_iter()
        .map(|seq| RawEvent::new("Ping", &serde_json::json!({ "seq": seq })).unwrap())
        .collect();
    serde_json::to_string(&events).unwrap()
}

fn post(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, body: String) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(post(body)).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {:?}", timeout);
}

/// Register a Ping handler that counts calls and sleeps `busy` per call.
fn count_pings(webhook: &Webhook, busy: Duration) -> Arc<AtomicU64> {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    register_handler(webhook, move |_: &Ping| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(busy);
    });
    calls
}

/// Register a handler for `Slow` and return a flag raised once it starts.
fn slow_handler(webhook: &Webhook) -> Arc<AtomicU64> {
    let started = Arc::new(AtomicU64::new(0));
    let flag = Arc::clone(&started);
    register_handler(webhook, move |slow: &Slow| {
        flag.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(slow.millis));
    });
    started
}

async fn occupy_worker(app: &Router, started: &Arc<AtomicU64>, millis: u64) {
    let before = started.load(Ordering::SeqCst);
    let body = format!(r#"[{{"type":"Slow","content":{{"millis":{}}}}}]"#, millis);
    let (status, _) = send(app, body).await;
    assert_eq!(status, StatusCode::OK);
    wait_for(Duration::from_secs(2), || started.load(Ordering::SeqCst) > before).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_event_is_delivered_exactly_once() {
    let webhook = webhook(Options::new().with_buffer_size(50).with_processors(4));
    let seen = Arc::new(Mutex::new(HashMap::<u64, u32>::new()));
    let sink = Arc::clone(&seen);
    register_handler(&webhook, move |ping: &Ping| {
        *sink.lock().unwrap().entry(ping.seq).or_default() += 1;
    });
    let app = webhook.router("/webhook");

    let (status, body) = send(&app, pings(0..50)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    wait_for(Duration::from_secs(5), || seen.lock().unwrap().len() == 50).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let seen = seen.lock().unwrap();
    assert!((0..50).all(|seq| seen.get(&seq) == Some(&1)));
    drop(seen);

    let stats = webhook.stats();
    assert_eq!(stats.received, 50);
    assert_eq!(stats.enqueued, 50);
    assert_eq!(stats.dispatched, 50);
    webhook.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saturated_queue_drops_event_after_timeout() {
    // One worker busy for 2s on the first Ping, two slots in the queue.
    let webhook = webhook(Options::new().with_buffer_size(2).with_processors(1));
    let calls = count_pings(&webhook, Duration::from_secs(2));
    let app = webhook.router("/webhook");

    let (status, _) = send(&app, pings([0])).await;
    assert_eq!(status, StatusCode::OK);
    wait_for(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 1).await;

    let started = Instant::now();
    let (status, body) = send(&app, pings([1, 2, 3])).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    // the third event waited out the ~1s enqueue window before being dropped
    assert!(elapsed >= Duration::from_millis(900), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1900), "returned after {:?}", elapsed);

    let stats = webhook.stats();
    assert_eq!(stats.enqueued, 3);
    assert_eq!(stats.dropped_timeout, 1);

    // first call plus the two queued events; the dropped one never runs
    wait_for(Duration::from_secs(8), || calls.load(Ordering::SeqCst) == 3).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    webhook.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_request_stops_admission_but_keeps_enqueued_events() {
    let webhook = webhook(
        Options::new()
            .with_buffer_size(1)
            .with_processors(1)
            .with_enqueue_timeout(Duration::from_secs(5)),
    );
    let started = slow_handler(&webhook);
    let calls = count_pings(&webhook, Duration::ZERO);
    let app = webhook.router("/webhook");

    occupy_worker(&app, &started, 500).await;

    // The client gives up while the second event waits for space.
    let request = app.clone().oneshot(post(pings([1, 2, 3])));
    assert!(tokio::time::timeout(Duration::from_millis(200), request)
        .await
        .is_err());

    let stats = webhook.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.dropped_timeout, 0);

    // the event admitted before the disconnect is still delivered
    wait_for(Duration::from_secs(3), || calls.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    webhook.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nothing_is_dispatched_after_shutdown() {
    let webhook = webhook(Options::new().with_buffer_size(4).with_processors(2));
    let calls = count_pings(&webhook, Duration::ZERO);
    let app = webhook.router("/webhook");

    webhook.shutdown().await;
    assert!(webhook.is_stopped());

    let (status, body) = send(&app, pings([1, 2])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "aborted");

    // events that do reach the queue just sit there
    webhook
        .queue()
        .enqueue(
            RawEvent::new("Ping", &serde_json::json!({ "seq": 9 })).unwrap(),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(webhook.queue().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auth_is_skipped_without_token_header() {
    let webhook = webhook(Options::new());
    let calls = count_pings(&webhook, Duration::ZERO);
    let app = webhook.router("/webhook");

    let mut request = post(pings([1]));
    request
        .headers_mut()
        .insert("x-wallet-token", "anything".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_for(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 1).await;
    webhook.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_deliveries_invoke_nothing() {
    let webhook = webhook(Options::new().with_token("X-Wallet-Token", "s3cret"));
    let calls = count_pings(&webhook, Duration::ZERO);
    let app = webhook.router("/webhook");

    let (status, _) = send(&app, pings([1, 2])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post("{not json".to_string());
    request
        .headers_mut()
        .insert("x-wallet-token", "s3cret".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let stats = webhook.stats();
    assert_eq!(stats.rejected_unauthorized, 1);
    assert_eq!(stats.rejected_malformed, 1);
    assert_eq!(stats.enqueued, 0);
    webhook.shutdown().await;
}
