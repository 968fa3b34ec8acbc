use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::routing::get;
use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use fanfetch_core::BatchConfig;
use fanfetch_server::admission::{AdmissionGate, limit_in_flight};
use fanfetch_server::config::ServerConfig;

use crate::common::{json_body, post_json, send, setup_test_app_with};

/// Router whose only handler parks until `release` is cancelled.
fn held_router(
    gate: Arc<AdmissionGate>,
    entered: Arc<AtomicUsize>,
    release: CancellationToken,
) -> Router {
    Router::new()
        .route(
            "/",
            get(move || {
                let entered = entered.clone();
                let release = release.clone();
                async move {
                    entered.fetch_add(1, Ordering::SeqCst);
                    release.cancelled().await;
                    "done"
                }
            }),
        )
        .layer(middleware::from_fn_with_state(gate, limit_in_flight))
}

fn get_root() -> Request<Body> {
    Request::get("/").body(Body::empty()).unwrap()
}

async fn wait_for(counter: &AtomicUsize, target: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.load(Ordering::SeqCst) < target {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("handlers never started");
}

#[tokio::test]
async fn over_ceiling_requests_get_429() {
    const CEILING: usize = 5;
    const EXTRA: usize = 12;

    let gate = Arc::new(AdmissionGate::new(CEILING));
    let entered = Arc::new(AtomicUsize::new(0));
    let release = CancellationToken::new();
    let router = held_router(gate.clone(), entered.clone(), release.clone());

    let held: Vec<_> = (0..CEILING)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { send(&router, get_root()).await.status() })
        })
        .collect();
    wait_for(&entered, CEILING).await;
    assert_eq!(gate.in_flight(), CEILING);

    let rejected = join_all((0..EXTRA).map(|_| send(&router, get_root()))).await;
    for response in rejected {
        let (status, json) = json_body(response).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["error"], "rate_limit_exceeded");
    }
    assert_eq!(entered.load(Ordering::SeqCst), CEILING, "rejected requests reached the handler");

    release.cancel();
    for handle in held {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(gate.in_flight(), 0);

    // A fresh wave within the ceiling is admitted in full.
    let statuses = join_all((0..CEILING).map(|_| send(&router, get_root()))).await;
    assert!(statuses.iter().all(|r| r.status() == StatusCode::OK));
    assert_eq!(gate.in_flight(), 0);
}

#[tokio::test]
async fn abandoned_request_releases_its_slot() {
    let gate = Arc::new(AdmissionGate::new(1));
    let entered = Arc::new(AtomicUsize::new(0));
    let release = CancellationToken::new();
    let router = held_router(gate.clone(), entered.clone(), release.clone());

    let client = tokio::spawn({
        let router = router.clone();
        async move { send(&router, get_root()).await }
    });
    wait_for(&entered, 1).await;
    assert_eq!(gate.in_flight(), 1);

    // The client goes away mid-request.
    client.abort();
    let _ = client.await;
    assert_eq!(gate.in_flight(), 0);

    release.cancel();
    let response = send(&router, get_root()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_not_gated() {
    let app = setup_test_app_with(ServerConfig {
        max_in_flight: 1,
        ..Default::default()
    })
    .await;
    let _held = app.state.gate.try_admit().unwrap();

    let response = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;

    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["in_flight"], 1);
    assert_eq!(json["max_in_flight"], 1);
}

#[tokio::test]
async fn fetch_route_rejects_when_full() {
    let app = setup_test_app_with(ServerConfig {
        max_in_flight: 2,
        ..Default::default()
    })
    .await;
    let _first = app.state.gate.try_admit().unwrap();
    let _second = app.state.gate.try_admit().unwrap();

    let response = send(
        &app.router,
        post_json("/v1/fetch", json!({ "urls": [app.url("/a")] })),
    )
    .await;

    let (status, json) = json_body(response).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"], "rate_limit_exceeded");
}

#[tokio::test]
async fn concurrent_batches_all_succeed_within_ceiling() {
    let app = setup_test_app_with(ServerConfig {
        batch: BatchConfig::default().with_worker_count(3),
        max_in_flight: 10,
        ..Default::default()
    })
    .await;

    let requests = (0..10).map(|i| {
        let urls: Vec<String> = (0..5).map(|j| app.url(&format!("/slow/20/{i}/{j}"))).collect();
        send(&app.router, post_json("/", json!({ "urls": urls })))
    });
    let responses = join_all(requests).await;

    for response in responses {
        let (status, json) = json_body(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
    assert_eq!(app.state.gate.in_flight(), 0);
}
