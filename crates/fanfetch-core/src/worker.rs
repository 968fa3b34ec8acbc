use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::accumulator::ResultAccumulator;
use crate::error::AppError;
use crate::models::{FetchJob, FetchResult};
use crate::traits::Fetcher;

/// Events emitted by a worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: usize,
    },
    JobStarted {
        worker_id: usize,
        url: &'a str,
    },
    JobCompleted {
        worker_id: usize,
        url: &'a str,
        bytes: usize,
    },
    JobFailed {
        worker_id: usize,
        url: &'a str,
        error: &'a AppError,
    },
    Cancelled {
        worker_id: usize,
    },
    Stopped {
        worker_id: usize,
        completed: usize,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::debug!(%worker_id, "Worker started");
            }
            WorkerEvent::JobStarted { worker_id, url } => {
                tracing::debug!(%worker_id, %url, "Fetching");
            }
            WorkerEvent::JobCompleted {
                worker_id,
                url,
                bytes,
            } => {
                tracing::debug!(%worker_id, %url, %bytes, "Fetched");
            }
            WorkerEvent::JobFailed {
                worker_id,
                url,
                error,
            } => {
                tracing::warn!(%worker_id, %url, %error, "Fetch failed");
            }
            WorkerEvent::Cancelled { worker_id } => {
                tracing::debug!(%worker_id, "Worker cancelled");
            }
            WorkerEvent::Stopped {
                worker_id,
                completed,
            } => {
                tracing::debug!(%worker_id, %completed, "Worker stopped");
            }
        }
    }
}

/// Why a worker returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue was closed and empty.
    Drained { completed: usize },
    /// The batch token fired; whatever the worker did is discarded.
    Cancelled,
    /// A fetch failed and the error was handed to the batch.
    Failed,
}

/// Fetch one URL with a fixed deadline. One attempt, no retries.
///
/// Every failure, including the deadline, is wrapped with the URL.
pub async fn fetch_url<F: Fetcher>(
    fetcher: &F,
    url: &str,
    timeout: Duration,
) -> Result<String, AppError> {
    match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(AppError::fetch(url, e)),
        Err(_) => Err(AppError::fetch(url, AppError::Timeout(timeout))),
    }
}

/// One member of a batch's worker pool.
///
/// Pulls jobs from the shared queue until it is closed, the batch is
/// cancelled, or one of its own fetches fails.
pub struct Worker<F, R> {
    id: usize,
    fetcher: F,
    request_timeout: Duration,
    queue: async_channel::Receiver<FetchJob>,
    results: Arc<ResultAccumulator>,
    errors: mpsc::Sender<AppError>,
    reporter: Arc<R>,
}

impl<F, R> Worker<F, R>
where
    F: Fetcher,
    R: WorkerReporter,
{
    pub fn new(
        id: usize,
        fetcher: F,
        request_timeout: Duration,
        queue: async_channel::Receiver<FetchJob>,
        results: Arc<ResultAccumulator>,
        errors: mpsc::Sender<AppError>,
        reporter: Arc<R>,
    ) -> Self {
        Self {
            id,
            fetcher,
            request_timeout,
            queue,
            results,
            errors,
            reporter,
        }
    }

    /// Run until the queue is drained or `cancel_token` fires.
    ///
    /// Cancellation wins over available work: once the token is observed no
    /// new fetch starts and an in-flight one is dropped.
    pub async fn run(self, cancel_token: CancellationToken) -> WorkerExit {
        self.reporter.report(WorkerEvent::Started { worker_id: self.id });

        let mut completed = 0;
        let exit = loop {
            let job = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break WorkerExit::Cancelled,
                job = self.queue.recv() => match job {
                    Ok(job) => job,
                    Err(_) => break WorkerExit::Drained { completed },
                },
            };

            self.reporter.report(WorkerEvent::JobStarted {
                worker_id: self.id,
                url: &job.url,
            });

            let outcome = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break WorkerExit::Cancelled,
                outcome = fetch_url(&self.fetcher, &job.url, self.request_timeout) => outcome,
            };

            match outcome {
                Ok(body) => {
                    if cancel_token.is_cancelled() {
                        break WorkerExit::Cancelled;
                    }
                    self.reporter.report(WorkerEvent::JobCompleted {
                        worker_id: self.id,
                        url: &job.url,
                        bytes: body.len(),
                    });
                    self.results.push(FetchResult {
                        url: job.url,
                        body,
                    });
                    completed += 1;
                }
                Err(error) => {
                    self.reporter.report(WorkerEvent::JobFailed {
                        worker_id: self.id,
                        url: &job.url,
                        error: &error,
                    });
                    // The collector outlives every worker, and the channel has
                    // one slot per worker, so this never waits.
                    if self.errors.send(error).await.is_err() {
                        tracing::error!(worker_id = %self.id, "Error collector is gone");
                    }
                    break WorkerExit::Failed;
                }
            }
        };

        if exit == WorkerExit::Cancelled {
            self.reporter
                .report(WorkerEvent::Cancelled { worker_id: self.id });
        }
        self.reporter.report(WorkerEvent::Stopped {
            worker_id: self.id,
            completed,
        });

        exit
    }
}
