use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fanfetch_core::BatchConfig;
use fanfetch_server::config::ServerConfig;
use fanfetch_server::routes;
use fanfetch_server::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Base URL of the local upstream the batches fetch from.
    pub upstream: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.upstream)
    }
}

/// Server with default limits and a four-worker pool.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(ServerConfig {
        batch: BatchConfig::default().with_worker_count(4),
        ..Default::default()
    })
    .await
}

pub async fn setup_test_app_with(config: ServerConfig) -> TestApp {
    let upstream = start_upstream().await;
    let state = Arc::new(
        AppState::from_config(&config, CancellationToken::new())
            .expect("Failed to build app state"),
    );

    TestApp {
        router: routes::router(state.clone()),
        state,
        upstream,
    }
}

/// Local upstream. `/slow/{ms}/...` sleeps before answering; every other
/// path answers immediately with `body:<path>`.
pub async fn start_upstream() -> String {
    let app = Router::new().fallback(|uri: Uri| async move {
        let path = uri.path().to_string();
        if let Some(ms) = path
            .strip_prefix("/slow/")
            .and_then(|rest| rest.split('/').next())
            .and_then(|ms| ms.parse::<u64>().ok())
        {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        format!("body:{path}")
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind upstream");
    let addr = listener.local_addr().expect("Failed to read upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Upstream crashed");
    });
    format!("http://{addr}")
}

/// An address nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read addr");
    drop(listener);
    format!("http://{addr}/")
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible")
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).expect("Body is not JSON");
    (status, json)
}
