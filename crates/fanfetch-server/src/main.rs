use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fanfetch_server::config::{ServerArgs, ServerConfig};
use fanfetch_server::routes;
use fanfetch_server::server;
use fanfetch_server::state::AppState;

#[derive(Parser)]
#[command(name = "fanfetch-server", version, about = "Batch URL fetching over HTTP")]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fanfetch=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::from(Cli::parse().server);
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::from_config(&config, shutdown.clone())?);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        %addr,
        workers = config.batch.worker_count,
        max_in_flight = config.max_in_flight,
        "Starting server"
    );
    let listener = TcpListener::bind(&addr).await?;

    server::serve(
        listener,
        app,
        shutdown,
        server::shutdown_signal(),
        config.shutdown_grace,
    )
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
