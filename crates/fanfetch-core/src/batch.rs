//! Fan-out/fan-in coordinator for one batch of URLs.
//!
//! A feeder task pushes the batch into a bounded queue, a fixed pool of
//! [`Worker`]s drains it, and a collector task owns the error channel. The
//! first error the collector receives is authoritative: it cancels the
//! batch token, every other worker stops before its next fetch, and the
//! caller gets that error and no results. Later errors are only logged.
//!
//! ```text
//! feeder ──► queue (cap = W) ──► worker × W ──► ResultAccumulator
//!                                    │
//!                                    └── errors ──► collector ──► cancel
//! ```
//!
//! Every spawned task is owned by the call: `fetch_batch` joins them all
//! before returning, and dropping the future aborts them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::accumulator::ResultAccumulator;
use crate::config::BatchConfig;
use crate::error::AppError;
use crate::models::{FetchJob, FetchResults};
use crate::traits::Fetcher;
use crate::worker::{TracingWorkerReporter, Worker, WorkerExit, WorkerReporter};

/// Fetches batches of URLs with a bounded worker pool. All-or-nothing.
pub struct BatchFetcher<F, R = TracingWorkerReporter> {
    fetcher: F,
    config: BatchConfig,
    reporter: Arc<R>,
}

impl<F: Fetcher> BatchFetcher<F> {
    pub fn new(fetcher: F, config: BatchConfig) -> Self {
        Self {
            fetcher,
            config,
            reporter: Arc::new(TracingWorkerReporter),
        }
    }
}

impl<F, R> BatchFetcher<F, R>
where
    F: Fetcher,
    R: WorkerReporter + 'static,
{
    /// Replace the reporter that receives worker events.
    pub fn with_reporter<R2: WorkerReporter + 'static>(
        self,
        reporter: Arc<R2>,
    ) -> BatchFetcher<F, R2> {
        BatchFetcher {
            fetcher: self.fetcher,
            config: self.config,
            reporter,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch every URL, or fail with the first error observed.
    ///
    /// Duplicate URLs are fetched once and appear once in the result.
    /// Cancelling `cancel_token` aborts the batch with [`AppError::Cancelled`].
    pub async fn fetch_batch(
        &self,
        cancel_token: &CancellationToken,
        urls: &[String],
    ) -> Result<FetchResults, AppError> {
        self.run(cancel_token, None, urls)
            .instrument(batch_span(urls))
            .await
    }

    /// Like [`fetch_batch`](Self::fetch_batch), failing with
    /// [`AppError::BatchTimeout`] if the whole batch is not done by `deadline`.
    pub async fn fetch_batch_until(
        &self,
        cancel_token: &CancellationToken,
        deadline: Instant,
        urls: &[String],
    ) -> Result<FetchResults, AppError> {
        self.run(cancel_token, Some(deadline), urls)
            .instrument(batch_span(urls))
            .await
    }

    /// Like [`fetch_batch_until`](Self::fetch_batch_until) with the deadline
    /// `timeout` from now. A timeout too large to represent as an instant
    /// means no batch deadline.
    pub async fn fetch_batch_within(
        &self,
        cancel_token: &CancellationToken,
        timeout: Duration,
        urls: &[String],
    ) -> Result<FetchResults, AppError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.fetch_batch_until(cancel_token, deadline, urls).await,
            None => {
                tracing::debug!(?timeout, "Batch timeout out of range, running without deadline");
                self.fetch_batch(cancel_token, urls).await
            }
        }
    }

    async fn run(
        &self,
        parent: &CancellationToken,
        deadline: Option<Instant>,
        urls: &[String],
    ) -> Result<FetchResults, AppError> {
        let jobs = unique_jobs(urls);
        if jobs.is_empty() {
            return Ok(FetchResults::default());
        }
        let job_count = jobs.len();
        let worker_count = self.config.worker_count.max(1);

        tracing::info!(jobs = job_count, workers = worker_count, "Batch started");

        let cancel_token = parent.child_token();
        let _cancel_on_drop = cancel_token.clone().drop_guard();

        let (job_tx, job_rx) = async_channel::bounded::<FetchJob>(worker_count);
        let (error_tx, error_rx) = mpsc::channel::<AppError>(worker_count);
        let results = Arc::new(ResultAccumulator::new());

        let feeder = AbortOnDropHandle::new(tokio::spawn(
            async move {
                for job in jobs {
                    if job_tx.send(job).await.is_err() {
                        break;
                    }
                }
            }
            .in_current_span(),
        ));

        let budget = deadline.map(|d| (d, d.saturating_duration_since(Instant::now())));
        let collector = AbortOnDropHandle::new(tokio::spawn(
            collect_errors(error_rx, cancel_token.clone(), budget).in_current_span(),
        ));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let worker = Worker::new(
                worker_id,
                self.fetcher.clone(),
                self.config.request_timeout,
                job_rx.clone(),
                results.clone(),
                error_tx.clone(),
                self.reporter.clone(),
            );
            workers.spawn(worker.run(cancel_token.clone()).in_current_span());
        }
        // The collector stops once the last worker drops its sender.
        drop(error_tx);

        let mut cancelled = false;
        let mut crashed = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(WorkerExit::Cancelled) => cancelled = true,
                Ok(WorkerExit::Drained { .. } | WorkerExit::Failed) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Worker task failed");
                    cancel_token.cancel();
                    crashed.get_or_insert(AppError::Internal(format!("worker task failed: {e}")));
                }
            }
        }

        // Nobody reads the queue any more. Closing it fails any send the
        // feeder is blocked on; the rest is discarded.
        job_rx.close();
        while job_rx.try_recv().is_ok() {}

        if let Err(e) = feeder.await {
            tracing::error!(error = %e, "Feeder task failed");
        }
        let first_error = collector
            .await
            .map_err(|e| AppError::Internal(format!("error collector failed: {e}")))?;

        if let Some(error) = first_error.or(crashed) {
            tracing::warn!(%error, "Batch failed");
            return Err(error);
        }
        if cancelled {
            tracing::info!("Batch cancelled by caller");
            return Err(AppError::Cancelled);
        }

        let results = Arc::try_unwrap(results)
            .map(ResultAccumulator::into_results)
            .unwrap_or_else(|shared| shared.snapshot());
        let results = FetchResults::from_results(results);
        debug_assert_eq!(results.len(), job_count);

        tracing::info!(results = results.len(), "Batch completed");
        Ok(results)
    }
}

/// Receive worker errors until every worker has exited.
///
/// The first error, or the batch deadline if it fires first, is kept and
/// cancels the batch. Returns `None` if neither happened.
async fn collect_errors(
    mut errors: mpsc::Receiver<AppError>,
    cancel_token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
) -> Option<AppError> {
    let mut first: Option<AppError> = None;

    let (deadline_at, budget) = match deadline {
        Some((at, budget)) => (Some(at), budget),
        None => (None, Duration::ZERO),
    };
    let timer = async move {
        match deadline_at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timer);
    let mut timer_armed = deadline_at.is_some();

    loop {
        tokio::select! {
            biased;
            received = errors.recv() => match received {
                Some(error) if first.is_none() => {
                    tracing::debug!(%error, "First error, cancelling batch");
                    first = Some(error);
                    cancel_token.cancel();
                }
                Some(error) => {
                    tracing::warn!(%error, "Additional fetch error ignored");
                }
                None => break,
            },
            () = &mut timer, if timer_armed => {
                timer_armed = false;
                tracing::debug!(?budget, "Batch deadline exceeded");
                if first.is_none() {
                    first = Some(AppError::BatchTimeout(budget));
                }
                cancel_token.cancel();
            }
        }
    }

    first
}

/// Distinct URLs in input order.
fn unique_jobs(urls: &[String]) -> Vec<FetchJob> {
    let mut seen = HashSet::with_capacity(urls.len());
    let jobs: Vec<FetchJob> = urls
        .iter()
        .filter(|url| seen.insert(url.as_str()))
        .map(FetchJob::new)
        .collect();
    if jobs.len() < urls.len() {
        tracing::debug!(
            duplicates = urls.len() - jobs.len(),
            "Collapsed duplicate URLs"
        );
    }
    jobs
}

fn batch_span(urls: &[String]) -> tracing::Span {
    tracing::info_span!("batch", batch_id = %Uuid::new_v4(), urls = urls.len())
}
