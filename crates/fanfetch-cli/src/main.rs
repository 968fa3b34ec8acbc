use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use fanfetch_client::ReqwestFetcher;
use fanfetch_core::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKER_COUNT};
use fanfetch_core::{BatchConfig, BatchFetcher};

#[derive(Parser)]
#[command(name = "fanfetch", version, about = "Fetch many URLs concurrently")]
struct Cli {
    /// URLs to fetch
    urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments are skipped)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, env = "FANFETCH_WORKER_COUNT", default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "FANFETCH_REQ_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    req_timeout_ms: u64,

    /// Whole-batch timeout in milliseconds (no limit if unset)
    #[arg(long, env = "FANFETCH_BATCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fanfetch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut urls = cli.urls;
    if let Some(path) = &cli.file {
        urls.extend(read_url_file(path)?);
    }
    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or with --file");
    }
    check_urls(&urls)?;

    let config = BatchConfig::default()
        .with_worker_count(cli.workers)
        .with_request_timeout(Duration::from_millis(cli.req_timeout_ms));
    config.validate()?;

    let fetcher = ReqwestFetcher::with_timeout(config.request_timeout)
        .context("Failed to create HTTP client")?;
    let batch = BatchFetcher::new(fetcher, config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling batch");
                cancel.cancel();
            }
        }
    });

    let results = match cli.timeout_ms {
        Some(ms) => {
            batch
                .fetch_batch_within(&cancel, Duration::from_millis(ms), &urls)
                .await?
        }
        None => batch.fetch_batch(&cancel, &urls).await?,
    };

    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}

/// Read URLs from a file, one per line.
fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
    Ok(parse_url_list(&contents))
}

fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn check_urls(urls: &[String]) -> Result<()> {
    for raw in urls {
        Url::parse(raw).with_context(|| format!("url {raw:?} is invalid"))?;
    }
    Ok(())
}
