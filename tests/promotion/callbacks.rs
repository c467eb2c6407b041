//! Callbacks delivered to a webhook receiver after promotion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use artifact_promote::config::Config;
use artifact_promote::{
    CallbackTarget, Collaborators, PromoteRequest, PromoteResult, PromotionManager, RuleRegistry,
};

use crate::common::*;

struct Hook {
    failures: usize,
    calls: AtomicUsize,
    tx: mpsc::UnboundedSender<PromoteResult>,
}

async fn receive(State(hook): State<Arc<Hook>>, Json(result): Json<PromoteResult>) -> StatusCode {
    let n = hook.calls.fetch_add(1, Ordering::SeqCst);
    if n < hook.failures {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let _ = hook.tx.send(result);
    StatusCode::OK
}

async fn webhook(failures: usize) -> (String, Arc<Hook>, mpsc::UnboundedReceiver<PromoteResult>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hook = Arc::new(Hook {
        failures,
        calls: AtomicUsize::new(0),
        tx,
    });
    let app = Router::new()
        .route("/promotions", post(receive))
        .with_state(Arc::clone(&hook));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/promotions", addr), hook, rx)
}

fn manager(world: &World) -> PromotionManager {
    PromotionManager::build(
        &Config::for_test(),
        Collaborators {
            storage: Arc::clone(&world.storage) as _,
            repositories: Arc::clone(&world.repositories) as _,
            content: Arc::clone(&world.content) as _,
            tracking: Some(Arc::clone(&world.tracking) as _),
            publisher: None,
        },
        RuleRegistry::with_builtin_rules(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_async_promotion_result_reaches_webhook() {
    let world = World::new().await;
    let (url, _, mut results) = webhook(0).await;
    let manager = manager(&world);

    let request = PromoteRequest::new(staging(), releases())
        .with_paths([JAR])
        .with_async(true)
        .with_callback(CallbackTarget::post(&url));
    let placeholder = manager.promote(request.clone()).await.unwrap();
    assert_eq!(placeholder.pending_paths, set(&[JAR]));

    let delivered = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("callback should arrive")
        .unwrap();
    assert_eq!(delivered.promotion_id(), request.promotion_id);
    assert_eq!(delivered.completed_paths, set(&[JAR]));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_failed_callback_is_redelivered() {
    let world = World::new().await;
    let (url, hook, mut results) = webhook(2).await;
    let manager = manager(&world);

    let result = manager
        .promote(
            PromoteRequest::new(staging(), releases())
                .with_paths([POM])
                .with_callback(CallbackTarget::post(&url)),
        )
        .await
        .unwrap();
    assert!(result.succeeded());

    let delivered = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("redelivered callback should arrive")
        .unwrap();
    assert_eq!(delivered, result);
    assert_eq!(hook.calls.load(Ordering::SeqCst), 3);
    manager.shutdown().await;
}
