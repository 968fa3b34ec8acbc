use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`BatchFetcher`](crate::batch::BatchFetcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of workers draining the queue of one batch.
    pub worker_count: usize,

    /// Deadline for each individual fetch, independent of the batch deadline.
    pub request_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BatchConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker_count == 0 {
            return Err(AppError::ConfigError(
                "worker count must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "request timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
