use std::sync::atomic::AtomicUsize;

use axum::extract::State;
use axum::http::{HeaderMap, Method as HttpMethod, StatusCode as HttpStatus};
use axum::routing::any;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::model::{PromoteRequest, StoreKey};

use super::*;

/// One request seen by the webhook receiver.
#[derive(Debug)]
struct Received {
    method: HttpMethod,
    token: Option<String>,
    body: serde_json::Value,
}

struct Receiver {
    /// Requests answered with 500 before switching to 200.
    failures: usize,
    seen: AtomicUsize,
    tx: mpsc::UnboundedSender<Received>,
}

async fn hook(
    State(receiver): State<Arc<Receiver>>,
    method: HttpMethod,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> HttpStatus {
    let n = receiver.seen.fetch_add(1, Ordering::SeqCst);
    let _ = receiver.tx.send(Received {
        method,
        token: headers
            .get("x-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    if n < receiver.failures {
        HttpStatus::INTERNAL_SERVER_ERROR
    } else {
        HttpStatus::OK
    }
}

/// Spawn a webhook receiver on an ephemeral port.
async fn receiver(failures: usize) -> (String, Arc<Receiver>, mpsc::UnboundedReceiver<Received>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(Receiver {
        failures,
        seen: AtomicUsize::new(0),
        tx,
    });
    let app = Router::new()
        .route("/hook", any(hook))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/hook", addr), state, rx)
}

fn config(base_delay_ms: u64, max_attempts: usize) -> CallbackConfig {
    CallbackConfig {
        base_delay_ms,
        max_attempts,
        timeout_secs: 2,
    }
}

fn result() -> PromoteResult {
    let request = PromoteRequest::new(
        StoreKey::hosted("maven", "staging"),
        StoreKey::hosted("maven", "releases"),
    )
    .with_paths(["org/foo/1.0/foo-1.0.jar"]);
    PromoteResult::new(request.clone()).with_completed(request.paths)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Received>) -> Received {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("callback should arrive")
        .expect("receiver open")
}

#[tokio::test]
async fn test_delivers_on_200_with_method_and_headers() {
    let (url, _, mut rx) = receiver(0).await;
    let dispatcher = CallbackDispatcher::new(&config(10, 3)).unwrap();
    let result = result();

    let target = CallbackTarget::put(&url).with_header("x-token", "secret");
    let outcome = dispatcher.deliver(&target, &result, 0).await;
    assert_eq!(outcome, Delivery::Delivered);

    let received = next(&mut rx).await;
    assert_eq!(received.method, HttpMethod::PUT);
    assert_eq!(received.token.as_deref(), Some("secret"));
    assert_eq!(
        received.body["request"]["promotionId"].as_str(),
        Some(result.promotion_id())
    );
    assert_eq!(dispatcher.pending(), 0);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_failure_schedules_doubling_redelivery() {
    let dispatcher = CallbackDispatcher::new(&config(60_000, 8)).unwrap();
    // Nothing listens on port 9 of localhost
    let target = CallbackTarget::post("http://127.0.0.1:9/hook");

    let first = dispatcher.deliver(&target, &result(), 0).await;
    assert_eq!(
        first,
        Delivery::Scheduled {
            attempt: 1,
            delay: Duration::from_secs(60)
        }
    );
    let third = dispatcher.deliver(&target, &result(), 2).await;
    assert_eq!(
        third,
        Delivery::Scheduled {
            attempt: 3,
            delay: Duration::from_secs(240)
        }
    );
    assert_eq!(dispatcher.pending(), 2);

    let last = dispatcher.deliver(&target, &result(), 8).await;
    assert_eq!(last, Delivery::Dropped);
    assert_eq!(dispatcher.pending(), 2);

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_non_200_success_status_is_a_failure() {
    let app = Router::new().route("/hook", any(|| async { HttpStatus::CREATED }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let dispatcher = CallbackDispatcher::new(&config(60_000, 8)).unwrap();
    let outcome = dispatcher
        .deliver(&CallbackTarget::post(format!("http://{}/hook", addr)), &result(), 0)
        .await;
    assert!(matches!(outcome, Delivery::Scheduled { attempt: 1, .. }));
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_dispatch_redelivers_until_success() {
    let (url, state, mut rx) = receiver(2).await;
    let dispatcher = CallbackDispatcher::new(&config(10, 3)).unwrap();

    dispatcher.dispatch(CallbackTarget::post(&url), result());

    for _ in 0..3 {
        let received = next(&mut rx).await;
        assert_eq!(received.method, HttpMethod::POST);
    }
    assert_eq!(state.seen.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.seen.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.pending(), 0);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_dispatch_drops_after_attempt_ceiling() {
    let (url, state, mut rx) = receiver(usize::MAX).await;
    let dispatcher = CallbackDispatcher::new(&config(10, 2)).unwrap();

    dispatcher.dispatch(CallbackTarget::post(&url), result());

    // First try plus two redeliveries
    for _ in 0..3 {
        next(&mut rx).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(state.seen.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.pending(), 0);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_redelivery() {
    let (url, state, mut rx) = receiver(usize::MAX).await;
    let dispatcher = CallbackDispatcher::new(&config(200, 3)).unwrap();

    let outcome = dispatcher.deliver(&CallbackTarget::post(&url), &result(), 0).await;
    assert!(matches!(outcome, Delivery::Scheduled { attempt: 1, .. }));
    next(&mut rx).await;

    dispatcher.shutdown().await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(state.seen.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.pending(), 1);
}

#[tokio::test]
async fn test_no_worker_restarts_after_shutdown() {
    let (url, state, mut rx) = receiver(usize::MAX).await;
    let dispatcher = CallbackDispatcher::new(&config(100, 3)).unwrap();
    dispatcher.start();
    dispatcher.shutdown().await;

    let outcome = dispatcher.deliver(&CallbackTarget::post(&url), &result(), 0).await;
    assert!(matches!(outcome, Delivery::Scheduled { attempt: 1, .. }));
    next(&mut rx).await;
    assert!(dispatcher.worker.lock().unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state.seen.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.pending(), 1);
}

#[tokio::test]
async fn test_queue_orders_by_due_time() {
    let now = Instant::now();
    let job = || Job {
        target: CallbackTarget::post("http://localhost/hook"),
        result: Arc::new(result()),
        attempt: 0,
    };
    let mut queue: Queue = BinaryHeap::new();
    queue.push(Reverse(Scheduled {
        due: now + Duration::from_secs(30),
        seq: 0,
        job: job(),
    }));
    queue.push(Reverse(Scheduled {
        due: now + Duration::from_secs(10),
        seq: 1,
        job: job(),
    }));
    queue.push(Reverse(Scheduled {
        due: now + Duration::from_secs(10),
        seq: 2,
        job: job(),
    }));

    let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|Reverse(s)| s.seq)).collect();
    assert_eq!(order, vec![1, 2, 0]);
}
