use std::time::Duration;

use clap::Args;

use fanfetch_core::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKER_COUNT};
use fanfetch_core::{AppError, BatchConfig};

use crate::admission::DEFAULT_MAX_IN_FLIGHT;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_URLS: usize = 20;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runtime configuration of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Worker pool size and per-request deadline for every batch.
    pub batch: BatchConfig,
    /// Admission ceiling on concurrently handled fetch requests.
    pub max_in_flight: usize,
    /// Most URLs accepted in one request.
    pub max_urls: usize,
    /// Deadline for a whole batch, measured from when the request is admitted.
    pub batch_timeout: Duration,
    /// How long in-flight batches may keep running after a shutdown signal
    /// before they are cancelled.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            batch: BatchConfig::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_urls: DEFAULT_MAX_URLS,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        self.batch.validate()?;
        if self.max_in_flight == 0 {
            return Err(AppError::ConfigError(
                "max in-flight requests must be at least 1".into(),
            ));
        }
        if self.max_urls == 0 {
            return Err(AppError::ConfigError(
                "max urls per request must be at least 1".into(),
            ));
        }
        if self.batch_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "batch timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Command-line flags, each with a `FANFETCH_*` environment fallback.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(long, env = "FANFETCH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Workers per batch
    #[arg(long, env = "FANFETCH_WORKER_COUNT", default_value_t = DEFAULT_WORKER_COUNT)]
    pub worker_count: usize,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "FANFETCH_REQ_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub req_timeout_ms: u64,

    /// Maximum concurrently handled fetch requests
    #[arg(long, env = "FANFETCH_MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// Maximum URLs per request
    #[arg(long, env = "FANFETCH_MAX_URLS", default_value_t = DEFAULT_MAX_URLS)]
    pub max_urls: usize,

    /// Whole-batch timeout in milliseconds
    #[arg(long, env = "FANFETCH_BATCH_TIMEOUT_MS", default_value_t = DEFAULT_BATCH_TIMEOUT.as_millis() as u64)]
    pub batch_timeout_ms: u64,

    /// Grace period in milliseconds for in-flight batches on shutdown
    #[arg(long, env = "FANFETCH_SHUTDOWN_GRACE_MS", default_value_t = DEFAULT_SHUTDOWN_GRACE.as_millis() as u64)]
    pub shutdown_grace_ms: u64,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            port: args.port,
            batch: BatchConfig::default()
                .with_worker_count(args.worker_count)
                .with_request_timeout(Duration::from_millis(args.req_timeout_ms)),
            max_in_flight: args.max_in_flight,
            max_urls: args.max_urls,
            batch_timeout: Duration::from_millis(args.batch_timeout_ms),
            shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
        }
    }
}
