use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fanfetch_core::BatchConfig;
use fanfetch_server::config::ServerConfig;
use fanfetch_server::routes;
use fanfetch_server::server::serve;
use fanfetch_server::state::AppState;

use crate::common::start_upstream;

struct RunningServer {
    base: String,
    upstream: String,
    state: Arc<AppState>,
    /// Stands in for Ctrl-C / SIGTERM.
    signal: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

async fn start_server(grace: Duration) -> RunningServer {
    let upstream = start_upstream().await;
    let config = ServerConfig {
        batch: BatchConfig::default().with_request_timeout(Duration::from_secs(10)),
        shutdown_grace: grace,
        ..Default::default()
    };
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::from_config(&config, shutdown.clone()).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let signal = CancellationToken::new();
    let handle = tokio::spawn(serve(
        listener,
        routes::router(state.clone()),
        shutdown,
        signal.clone().cancelled_owned(),
        grace,
    ));

    RunningServer {
        base,
        upstream,
        state,
        signal,
        handle,
    }
}

impl RunningServer {
    fn post_batch(&self, url: String) -> JoinHandle<(StatusCode, serde_json::Value)> {
        let endpoint = format!("{}/", self.base);
        tokio::spawn(async move {
            let response = reqwest::Client::new()
                .post(endpoint)
                .json(&json!({ "urls": [url] }))
                .send()
                .await
                .unwrap();
            let status = response.status();
            (status, response.json().await.unwrap())
        })
    }

    async fn wait_until_in_flight(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.state.gate.in_flight() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("request never reached the server");
    }
}

#[tokio::test]
async fn in_flight_batch_finishes_after_signal() {
    let server = start_server(Duration::from_secs(10)).await;
    let url = format!("{}/slow/300/x", server.upstream);

    let request = server.post_batch(url.clone());
    server.wait_until_in_flight(1).await;
    server.signal.cancel();

    let (status, json) = request.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[&url], "body:/slow/300/x");

    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(!server.state.shutdown.is_cancelled());
}

#[tokio::test]
async fn batches_outliving_grace_are_cancelled() {
    let server = start_server(Duration::from_millis(50)).await;
    let url = format!("{}/slow/5000/x", server.upstream);

    let request = server.post_batch(url);
    server.wait_until_in_flight(1).await;
    server.signal.cancel();

    let (status, json) = request.await.unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "cancelled");

    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(server.state.shutdown.is_cancelled());
}
