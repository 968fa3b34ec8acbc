use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fanfetch_client::ReqwestFetcher;
use fanfetch_core::{AppError, BatchFetcher};

use crate::admission::AdmissionGate;
use crate::config::ServerConfig;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub batch: BatchFetcher<ReqwestFetcher>,
    pub gate: Arc<AdmissionGate>,
    pub max_urls: usize,
    pub batch_timeout: Duration,
    /// Cancelled on shutdown; every batch runs under a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn from_config(config: &ServerConfig, shutdown: CancellationToken) -> Result<Self, AppError> {
        config.validate()?;
        let fetcher = ReqwestFetcher::with_timeout(config.batch.request_timeout)?;

        Ok(Self {
            batch: BatchFetcher::new(fetcher, config.batch.clone()),
            gate: Arc::new(AdmissionGate::new(config.max_in_flight)),
            max_urls: config.max_urls,
            batch_timeout: config.batch_timeout,
            shutdown,
        })
    }
}
