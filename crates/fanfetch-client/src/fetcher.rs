use std::time::Duration;

use fanfetch_core::config::DEFAULT_REQUEST_TIMEOUT;
use fanfetch_core::error::AppError;
use fanfetch_core::traits::Fetcher;
use reqwest::Client;

/// HTTP fetcher using reqwest.
///
/// Issues one GET per call and reads the whole body as text. The client-level
/// timeout covers connect, send and body read. The response status is not
/// inspected: an error page is still a body.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("fanfetch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else if e.is_builder() {
            AppError::HttpError(format!("couldn't build request: {e}"))
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::NetworkError(format!("request failed: {e}"))
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Non-success status, keeping body");
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout)
            } else {
                AppError::HttpError(format!("couldn't read body: {e}"))
            }
        })
    }
}
